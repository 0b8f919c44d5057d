//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use kiosk_media::config::{DEFAULT_FFMPEG, DEFAULT_FFPROBE, DEFAULT_MIN_INPUT_BYTES};
use kiosk_media::PipelineConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for per-job working directories
    pub work_dir: PathBuf,
    /// Background music files
    pub assets_dir: PathBuf,
    /// Finished clips land here as `<job_id>.mp4`
    pub output_dir: PathBuf,
    /// Single-pass encode budget
    pub single_pass_timeout: Duration,
    /// Budget for each fallback stage
    pub stage_timeout: Duration,
    pub probe_timeout: Duration,
    /// Time between graceful and forceful termination
    pub kill_grace: Duration,
    pub min_input_bytes: u64,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("kiosk-clip"),
            assets_dir: PathBuf::from("assets/music"),
            output_dir: PathBuf::from("output"),
            single_pass_timeout: Duration::from_secs(120),
            stage_timeout: Duration::from_secs(90),
            probe_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(2),
            min_input_bytes: DEFAULT_MIN_INPUT_BYTES,
            ffmpeg: DEFAULT_FFMPEG.to_string(),
            ffprobe: DEFAULT_FFPROBE.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Unset or unparsable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            work_dir: lookup("KIOSK_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            assets_dir: lookup("KIOSK_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            output_dir: lookup("KIOSK_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            single_pass_timeout: secs(
                "KIOSK_SINGLE_PASS_TIMEOUT_SECS",
                defaults.single_pass_timeout,
            ),
            stage_timeout: secs("KIOSK_STAGE_TIMEOUT_SECS", defaults.stage_timeout),
            probe_timeout: secs("KIOSK_PROBE_TIMEOUT_SECS", defaults.probe_timeout),
            kill_grace: millis("KIOSK_KILL_GRACE_MS", defaults.kill_grace),
            min_input_bytes: lookup("KIOSK_MIN_INPUT_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_input_bytes),
            ffmpeg: lookup("KIOSK_FFMPEG").unwrap_or(defaults.ffmpeg),
            ffprobe: lookup("KIOSK_FFPROBE").unwrap_or(defaults.ffprobe),
        }
    }

    /// Pipeline settings for one job.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_work_root(&self.work_dir)
            .with_assets_dir(&self.assets_dir)
            .with_output_dir(&self.output_dir)
            .with_single_pass_timeout(self.single_pass_timeout)
            .with_stage_timeout(self.stage_timeout)
            .with_probe_timeout(self.probe_timeout)
            .with_kill_grace(self.kill_grace)
            .with_min_input_bytes(self.min_input_bytes);
        config.ffmpeg_program = self.ffmpeg.clone();
        config.ffprobe_program = self.ffprobe.clone();
        config
    }
}
