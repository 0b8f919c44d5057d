//! Normal and slow-motion sub-clips cut from a normalized intermediate.
//!
//! Every segment is encoded with the same codec settings, geometry, frame rate
//! and pixel format so the concat demuxer can join them without re-encoding.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use kiosk_models::timing::DEGENERATE_CLIP_SECS;
use kiosk_models::{PipelineStage, Timing};

use crate::command::FfmpegCommand;
use crate::config::PipelineConfig;
use crate::error::MediaResult;
use crate::filter_graph::build_segment;
use crate::runner::{run_verified, EncodeStep, EncoderRunner};

/// One planned sub-clip in source time.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub name: &'static str,
    pub start: f64,
    pub end: f64,
    pub slow: bool,
}

impl SegmentSpec {
    /// Length after the speed ramp.
    pub fn output_secs(&self) -> f64 {
        let span = self.end - self.start;
        if self.slow {
            span * kiosk_models::timing::SLOWMO_FACTOR
        } else {
            span
        }
    }
}

/// Segments to cut, in playback order. Zero-length segments are left out.
pub fn plan_segments(timing: &Timing) -> Vec<SegmentSpec> {
    let n = timing.normal_secs();
    let s = timing.slowmo_secs();
    let mut specs = Vec::with_capacity(2);

    if timing.has_normal() {
        specs.push(SegmentSpec {
            name: "normal",
            start: 0.0,
            end: n,
            slow: false,
        });
    }
    if timing.has_slowmo() {
        specs.push(SegmentSpec {
            name: "slow",
            start: n,
            end: n + s,
            slow: true,
        });
    }
    if specs.is_empty() {
        specs.push(SegmentSpec {
            name: "normal",
            start: 0.0,
            end: DEGENERATE_CLIP_SECS,
            slow: false,
        });
    }
    specs
}

/// Cuts segments through an [`EncoderRunner`].
pub struct SegmentEncoder<'a> {
    runner: &'a dyn EncoderRunner,
    config: &'a PipelineConfig,
}

impl<'a> SegmentEncoder<'a> {
    pub fn new(runner: &'a dyn EncoderRunner, config: &'a PipelineConfig) -> Self {
        Self { runner, config }
    }

    /// Command for one segment.
    pub fn command(
        &self,
        normalized: &Path,
        planned: &SegmentSpec,
        output: &Path,
    ) -> FfmpegCommand {
        let plan = build_segment(planned.start, planned.end, planned.slow, self.config.target);
        FfmpegCommand::new(normalized, output)
            .filter_graph(&plan.graph)
            .map(plan.map_arg())
            .no_audio()
            .encoding(&self.config.encoding, self.config.target.fps)
    }

    /// Encode every planned segment into `work_dir`, returning paths in order.
    pub async fn encode(
        &self,
        normalized: &Path,
        timing: &Timing,
        work_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        if timing.is_degenerate() {
            warn!("Both durations are zero, cutting a 1 second clip");
        }

        let mut outputs = Vec::new();
        for planned in plan_segments(timing) {
            let output = work_dir.join(format!("segment_{}.mp4", planned.name));
            let step = EncodeStep::new(
                PipelineStage::Segment,
                self.command(normalized, &planned, &output),
                self.config.stage_timeout,
            )
            .expecting(planned.output_secs());

            run_verified(self.runner, &step).await?;
            info!(
                segment = planned.name,
                start = planned.start,
                end = planned.end,
                "Segment encoded"
            );
            outputs.push(output);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_both() {
        let specs = plan_segments(&Timing::new(5.0, 3.0).unwrap());
        assert_eq!(specs.len(), 2);
        assert_eq!((specs[0].start, specs[0].end, specs[0].slow), (0.0, 5.0, false));
        assert_eq!((specs[1].start, specs[1].end, specs[1].slow), (5.0, 8.0, true));
        let total: f64 = specs.iter().map(SegmentSpec::output_secs).sum();
        assert!((total - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_skips_zero_length() {
        let specs = plan_segments(&Timing::new(6.0, 0.0).unwrap());
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].slow);

        let specs = plan_segments(&Timing::new(0.0, 2.0).unwrap());
        assert_eq!(specs.len(), 1);
        assert_eq!((specs[0].start, specs[0].end), (0.0, 2.0));
        assert!((specs[0].output_secs() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_degenerate() {
        let specs = plan_segments(&Timing::new(0.0, 0.0).unwrap());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].end, DEGENERATE_CLIP_SECS);
    }

    #[test]
    fn test_segments_share_encoding() {
        struct Never;
        #[async_trait::async_trait]
        impl EncoderRunner for Never {
            async fn run(&self, _: &EncodeStep) -> MediaResult<kiosk_models::EncodingResult> {
                unreachable!()
            }
        }
        let config = PipelineConfig::default();
        let encoder = SegmentEncoder::new(&Never, &config);
        let specs = plan_segments(&Timing::new(2.0, 2.0).unwrap());

        let a = encoder.command(Path::new("n.mp4"), &specs[0], Path::new("a.mp4")).build_args();
        let b = encoder.command(Path::new("n.mp4"), &specs[1], Path::new("b.mp4")).build_args();
        let codec_args = |args: &[String]| {
            let at = args.iter().position(|a| a == "-c:v").unwrap();
            args[at..args.len() - 1].to_vec()
        };
        assert_eq!(codec_args(&a), codec_args(&b));
        assert!(b.iter().any(|a| a.contains("setpts=2*(PTS-STARTPTS)")));
    }
}
