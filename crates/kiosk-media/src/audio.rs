//! Optional background music.
//!
//! Music never fails a job. Missing tracks and failed mixes are logged and the
//! video-only file is returned instead.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use kiosk_models::{MusicChoice, PipelineStage, StyleConfig};

use crate::command::FfmpegCommand;
use crate::config::PipelineConfig;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_quietly;
use crate::runner::{run_verified, EncodeStep, EncoderRunner};
use crate::telemetry;

/// Known music identifiers and their file names under the assets directory.
pub const MUSIC_TRACKS: &[(&str, &str)] = &[
    ("trackA", "track_a.mp3"),
    ("trackB", "track_b.mp3"),
    ("trackC", "track_c.mp3"),
];

const MIXED_FILE: &str = "with_music.mp4";

/// How the audio step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    /// Track looped under the video
    Mixed { track: String },
    /// No music requested
    Skipped,
    /// Music requested but the video-only file was used
    FellBack { reason: String },
}

impl AudioOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioOutcome::Mixed { .. } => "mixed",
            AudioOutcome::Skipped => "skipped",
            AudioOutcome::FellBack { .. } => "fell_back",
        }
    }
}

impl fmt::Display for AudioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOutcome::Mixed { track } => write!(f, "mixed ({})", track),
            AudioOutcome::Skipped => f.write_str("skipped"),
            AudioOutcome::FellBack { reason } => write!(f, "fell back ({})", reason),
        }
    }
}

/// Resolve a music id against the static table and the assets directory.
pub fn resolve_track(assets_dir: &Path, id: &str) -> MediaResult<PathBuf> {
    let file = MUSIC_TRACKS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, file)| *file)
        .ok_or_else(|| MediaError::missing_asset(format!("unknown music id '{}'", id)))?;

    let path = assets_dir.join(file);
    if !path.is_file() {
        return Err(MediaError::missing_asset(format!(
            "music file for '{}' not found at {}",
            id,
            path.display()
        )));
    }
    Ok(path)
}

/// Command looping `track` under `video`, cut to the video's length.
pub fn mix_command(
    config: &PipelineConfig,
    video: &Path,
    track: &Path,
    output: &Path,
) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .add_input(track)
        .stream_loop()
        .map("0:v")
        .map("1:a")
        .video_codec("copy")
        .audio_encoding(&config.encoding)
        .shortest()
        .output_args(["-movflags", "+faststart"])
}

/// Adds background music when requested.
pub struct AudioMixer<'a> {
    runner: &'a dyn EncoderRunner,
    config: &'a PipelineConfig,
}

impl<'a> AudioMixer<'a> {
    pub fn new(runner: &'a dyn EncoderRunner, config: &'a PipelineConfig) -> Self {
        Self { runner, config }
    }

    /// Returns the file to publish and what happened.
    pub async fn apply(
        &self,
        video: &Path,
        style: &StyleConfig,
        work_dir: &Path,
    ) -> (PathBuf, AudioOutcome) {
        let (path, outcome) = self.mix(video, style, work_dir).await;
        telemetry::record_audio_outcome(outcome.as_str());
        (path, outcome)
    }

    async fn mix(
        &self,
        video: &Path,
        style: &StyleConfig,
        work_dir: &Path,
    ) -> (PathBuf, AudioOutcome) {
        let id = match style.music_choice() {
            MusicChoice::Silent => {
                info!("No music requested");
                return (video.to_path_buf(), AudioOutcome::Skipped);
            }
            MusicChoice::Track(id) => id,
        };

        let track = match resolve_track(&self.config.assets_dir, &id) {
            Ok(track) => track,
            Err(e) => {
                warn!(
                    music = %id,
                    category = %e.category(),
                    error = %e,
                    "Music unavailable, continuing without audio"
                );
                return (video.to_path_buf(), AudioOutcome::FellBack { reason: e.to_string() });
            }
        };

        let output = work_dir.join(MIXED_FILE);
        let step = EncodeStep::new(
            PipelineStage::AudioMix,
            mix_command(self.config, video, &track, &output),
            self.config.stage_timeout,
        );

        match run_verified(self.runner, &step).await {
            Ok(result) => {
                info!(music = %id, elapsed_ms = result.elapsed_ms(), "Music mixed");
                (output, AudioOutcome::Mixed { track: id })
            }
            Err(e) => {
                warn!(
                    music = %id,
                    category = %e.category(),
                    error = %e,
                    "Music mix failed, using video-only output"
                );
                remove_quietly(&output).await;
                (video.to_path_buf(), AudioOutcome::FellBack { reason: e.to_string() })
            }
        }
    }
}
