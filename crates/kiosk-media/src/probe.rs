//! FFprobe orientation and aspect inspection.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use kiosk_models::{Rotation, VideoAsset};

use crate::command::check_program;
use crate::config::PipelineConfig;
use crate::error::{MediaError, MediaResult};

/// Inspects a source clip. Never fails; unknown properties get safe defaults.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> VideoAsset;
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    rotation: Option<f64>,
}

const DISPLAY_MATRIX: &str = "Display Matrix";

/// Runs `ffprobe` with a time budget.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: String,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ffprobe_program.clone(), config.probe_timeout)
    }

    /// Probe and surface every failure.
    pub async fn try_probe(&self, path: &Path) -> MediaResult<VideoAsset> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let program = check_program(&self.program)?;

        let child = Command::new(program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| MediaError::timeout("probe", self.timeout.as_millis() as u64))??;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("ffprobe exited with {}", output.status),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        parse_probe_output(path, &output.stdout)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> VideoAsset {
        match self.try_probe(path).await {
            Ok(asset) => {
                debug!(
                    width = asset.width,
                    height = asset.height,
                    rotation = asset.rotation.degrees(),
                    aspect = asset.aspect_class.as_str(),
                    "Probed source clip"
                );
                asset
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Probe failed, assuming upright clip with unknown aspect"
                );
                VideoAsset::unprobed(path)
            }
        }
    }
}

/// Build a [`VideoAsset`] from ffprobe's JSON.
fn parse_probe_output(path: &Path, json: &[u8]) -> MediaResult<VideoAsset> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().map_or(true, |t| t == "video"))
        .ok_or_else(|| MediaError::invalid_input("No video stream found"))?;

    Ok(VideoAsset::new(
        path,
        stream.width.unwrap_or(0),
        stream.height.unwrap_or(0),
        stream_rotation(stream),
    ))
}

/// The rotate tag wins; otherwise the display matrix, whose sign is inverted.
fn stream_rotation(stream: &FfprobeStream) -> Rotation {
    let tagged = stream
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.trim().parse::<f64>().ok());
    if let Some(degrees) = tagged {
        return Rotation::from_degrees(degrees);
    }

    stream
        .side_data_list
        .iter()
        .filter(|sd| sd.side_data_type.as_deref() == Some(DISPLAY_MATRIX))
        .find_map(|sd| sd.rotation)
        .map(Rotation::from_display_matrix)
        .unwrap_or(Rotation::None)
}
