//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use kiosk_models::{EncodingProfile, TargetFormat};

/// Default program names, resolved through PATH.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// Smallest source clip accepted, in bytes.
pub const DEFAULT_MIN_INPUT_BYTES: u64 = 1024;

/// Configuration shared by every stage of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent directory for per-job working directories
    pub work_root: PathBuf,
    /// Directory holding background music files
    pub assets_dir: PathBuf,
    /// Where finished clips are written as `<job_id>.mp4`
    pub output_dir: PathBuf,
    /// Output frame geometry
    pub target: TargetFormat,
    /// Codec settings for every re-encode
    pub encoding: EncodingProfile,
    /// Budget for the fused single-pass encode
    pub single_pass_timeout: Duration,
    /// Budget for each multi-stage step and the audio mix
    pub stage_timeout: Duration,
    /// Budget for ffprobe
    pub probe_timeout: Duration,
    /// Time between graceful and forceful termination
    pub kill_grace: Duration,
    /// Source clips smaller than this are rejected
    pub min_input_bytes: u64,
    pub ffmpeg_program: String,
    pub ffprobe_program: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("kiosk-clip"),
            assets_dir: PathBuf::from("assets/music"),
            output_dir: PathBuf::from("output"),
            target: TargetFormat::default(),
            encoding: EncodingProfile::default(),
            single_pass_timeout: Duration::from_secs(120),
            stage_timeout: Duration::from_secs(90),
            probe_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(2),
            min_input_bytes: DEFAULT_MIN_INPUT_BYTES,
            ffmpeg_program: DEFAULT_FFMPEG.to_string(),
            ffprobe_program: DEFAULT_FFPROBE.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_single_pass_timeout(mut self, timeout: Duration) -> Self {
        self.single_pass_timeout = timeout;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_min_input_bytes(mut self, bytes: u64) -> Self {
        self.min_input_bytes = bytes;
        self
    }
}
