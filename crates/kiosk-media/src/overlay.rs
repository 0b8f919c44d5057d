//! Overlay composite and mobile-safe re-encode.

use std::path::Path;

use tracing::info;

use kiosk_models::{EncodingResult, PipelineStage};

use crate::command::FfmpegCommand;
use crate::config::PipelineConfig;
use crate::error::MediaResult;
use crate::filter_graph::build_overlay;
use crate::runner::{run_verified, EncodeStep, EncoderRunner};

/// Command compositing `overlay` (input 1) onto `video` (input 0).
///
/// Audio is copied when the video has any.
pub fn overlay_command(
    config: &PipelineConfig,
    video: &Path,
    overlay: &Path,
    output: &Path,
) -> FfmpegCommand {
    let plan = build_overlay(config.target);
    FfmpegCommand::new(video, output)
        .add_input(overlay)
        .filter_graph(&plan.graph)
        .map(plan.map_arg())
        .map("0:a?")
        .encoding(&config.encoding, config.target.fps)
        .audio_codec("copy")
}

pub async fn composite(
    runner: &dyn EncoderRunner,
    config: &PipelineConfig,
    video: &Path,
    overlay: &Path,
    output: &Path,
) -> MediaResult<EncodingResult> {
    let step = EncodeStep::new(
        PipelineStage::Overlay,
        overlay_command(config, video, overlay, output),
        config.stage_timeout,
    );
    let result = run_verified(runner, &step).await?;
    info!(elapsed_ms = result.elapsed_ms(), "Overlay composited");
    Ok(result)
}
