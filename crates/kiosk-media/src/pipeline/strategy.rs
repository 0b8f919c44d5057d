//! Ordered normalization fallbacks.
//!
//! Each strategy turns the raw clip into an upright W×H intermediate a
//! different way. They are tried in [`NORMALIZE_STRATEGIES`] order; the first
//! that produces a verified file wins.

use std::fmt;
use std::path::Path;

use kiosk_models::{PipelineStage, Rotation, ScaleMode, Timing, VideoAsset};

use crate::command::FfmpegCommand;
use crate::config::PipelineConfig;
use crate::filter_graph::build_normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizeStrategy {
    /// Probed rotation through the filter graph, auto-rotation off
    ComputedRotation,
    /// FFmpeg's own display-matrix rotation, no rotation filter
    AutoRotate,
    /// No rotation at all, always padded
    NoRotation,
}

pub const NORMALIZE_STRATEGIES: [NormalizeStrategy; 3] = [
    NormalizeStrategy::ComputedRotation,
    NormalizeStrategy::AutoRotate,
    NormalizeStrategy::NoRotation,
];

impl NormalizeStrategy {
    pub fn name(&self) -> &'static str {
        self.stage().as_str()
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            NormalizeStrategy::ComputedRotation => PipelineStage::Normalize,
            NormalizeStrategy::AutoRotate => PipelineStage::NormalizeAutorotate,
            NormalizeStrategy::NoRotation => PipelineStage::NormalizeNoRotation,
        }
    }

    /// Rotation applied in the filter graph, if any.
    pub fn rotation(&self, asset: &VideoAsset) -> Option<Rotation> {
        match self {
            NormalizeStrategy::ComputedRotation => Some(asset.rotation),
            NormalizeStrategy::AutoRotate | NormalizeStrategy::NoRotation => None,
        }
    }

    pub fn scale_mode(&self, asset: &VideoAsset) -> ScaleMode {
        match self {
            NormalizeStrategy::NoRotation => ScaleMode::Pad,
            _ => asset.scale_mode(),
        }
    }

    fn uses_autorotate(&self) -> bool {
        matches!(self, NormalizeStrategy::AutoRotate)
    }

    pub fn command(
        &self,
        config: &PipelineConfig,
        asset: &VideoAsset,
        timing: &Timing,
        output: &Path,
    ) -> FfmpegCommand {
        let plan = build_normalize(
            timing,
            self.rotation(asset),
            self.scale_mode(asset),
            config.target,
        );

        let mut command = FfmpegCommand::new(&asset.path, output).duration(plan.input_duration);
        if !self.uses_autorotate() {
            command = command.no_autorotate();
        }
        command
            .filter_graph(&plan.graph)
            .map(plan.map_arg())
            .no_audio()
            .encoding(&config.encoding, config.target.fps)
    }
}

impl fmt::Display for NormalizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated_legacy() -> VideoAsset {
        // 480x640 coded, rotated 90: upright 640x480
        VideoAsset::new("raw.mp4", 480, 640, Rotation::Cw90)
    }

    fn args(strategy: NormalizeStrategy) -> String {
        strategy
            .command(
                &PipelineConfig::default(),
                &rotated_legacy(),
                &Timing::new(3.0, 2.0).unwrap(),
                Path::new("normalized.mp4"),
            )
            .build_args()
            .join(" ")
    }

    #[test]
    fn test_order_and_names() {
        let names: Vec<_> = NORMALIZE_STRATEGIES.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["normalize", "normalize_autorotate", "normalize_no_rotation"]
        );
    }

    #[test]
    fn test_computed_rotation() {
        let joined = args(NormalizeStrategy::ComputedRotation);
        assert!(joined.contains("-noautorotate"));
        assert!(joined.contains("transpose=1"));
        assert!(joined.contains("crop=1080:1920"));
        assert!(joined.contains("-t 5.000"));
    }

    #[test]
    fn test_autorotate() {
        let joined = args(NormalizeStrategy::AutoRotate);
        assert!(!joined.contains("-noautorotate"));
        assert!(!joined.contains("transpose"));
        assert!(joined.contains("crop=1080:1920"));
    }

    #[test]
    fn test_no_rotation_always_pads() {
        let joined = args(NormalizeStrategy::NoRotation);
        assert!(joined.contains("-noautorotate"));
        assert!(!joined.contains("transpose"));
        assert!(!joined.contains("crop="));
        assert!(joined.contains("pad=1080:1920"));
    }
}
