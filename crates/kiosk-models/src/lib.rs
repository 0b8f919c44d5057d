//! Shared data models for the kiosk clip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers and pipeline stages
//! - Style and timing configuration supplied by the kiosk
//! - Probed video properties (rotation, aspect class)
//! - Encoding profile and per-stage encoding results

pub mod encoding;
pub mod job;
pub mod style;
pub mod timing;
pub mod video;

// Re-export common types
pub use encoding::{EncodingProfile, EncodingResult, TargetFormat};
pub use job::{JobId, PipelineStage};
pub use style::{MusicChoice, StyleConfig};
pub use timing::{Timing, TimingError};
pub use video::{AspectClass, Rotation, ScaleMode, VideoAsset};
