//! Stream-copy join of ordered sub-clips through the concat demuxer.

use std::path::{Path, PathBuf};

use tracing::info;

use kiosk_models::{EncodingResult, PipelineStage};

use crate::command::FfmpegCommand;
use crate::config::PipelineConfig;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_quietly;
use crate::runner::{run_verified, EncodeStep, EncoderRunner};

pub const CONCAT_LIST_FILE: &str = "concat.txt";

/// Quote a path for a concat list line.
fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Concat demuxer list contents, one `file '<path>'` line per segment.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file {}\n", quote_path(p)))
        .collect()
}

/// Join `segments` into `output` without re-encoding.
///
/// On success the consumed segments and the list file are deleted.
pub async fn concatenate(
    runner: &dyn EncoderRunner,
    config: &PipelineConfig,
    segments: &[PathBuf],
    work_dir: &Path,
    output: &Path,
) -> MediaResult<EncodingResult> {
    if segments.is_empty() {
        return Err(MediaError::internal("No segments to concatenate"));
    }

    let list_path = work_dir.join(CONCAT_LIST_FILE);
    tokio::fs::write(&list_path, concat_list(segments)).await?;

    let command = FfmpegCommand::new(&list_path, output)
        .concat_demuxer()
        .codec_copy()
        .output_args(["-movflags", "+faststart"]);
    let step = EncodeStep::new(PipelineStage::Concatenate, command, config.stage_timeout);

    let result = run_verified(runner, &step).await?;

    for segment in segments {
        remove_quietly(segment).await;
    }
    remove_quietly(&list_path).await;

    info!(
        segments = segments.len(),
        elapsed_ms = result.elapsed_ms(),
        "Segments concatenated"
    );
    Ok(result)
}
