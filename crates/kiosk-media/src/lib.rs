#![deny(unreachable_patterns)]
//! FFmpeg orchestration for the kiosk clip pipeline.
//!
//! This crate provides:
//! - Bounded, fail-open probing of rotation and aspect
//! - Typed filter graphs serialized to `-filter_complex` at the call boundary
//! - A process watchdog that kills the whole encoder tree on timeout
//! - Segment, concat, overlay and music stages used by the fallback path
//! - [`TransformPipeline`], which runs one job end to end

pub mod audio;
pub mod command;
pub mod concat;
pub mod config;
pub mod error;
pub mod filter_graph;
pub mod fs_utils;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod segment;
pub mod telemetry;
pub mod watchdog;

pub use audio::{AudioMixer, AudioOutcome, MUSIC_TRACKS};
pub use command::{check_program, FfmpegCommand};
pub use config::PipelineConfig;
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use filter_graph::{FilterGraph, FilterGraphBuilder, FilterPlan};
pub use pipeline::{
    JobRequest, NormalizeStrategy, PipelineOutput, ProcessingJob, ProducedBy, TransformPipeline,
};
pub use probe::{FfprobeProber, Prober};
pub use progress::FfmpegProgress;
pub use runner::{EncodeStep, EncoderRunner, FfmpegRunner};
pub use segment::SegmentEncoder;
pub use watchdog::{platform_terminator, Invocation, ProcessWatchdog, TreeTerminator};
