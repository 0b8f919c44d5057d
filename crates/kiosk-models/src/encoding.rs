//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Baseline profile for widest device playback
pub const DEFAULT_PROFILE: &str = "baseline";
/// Level 4.0 covers 1080x1920 at 30 fps
pub const DEFAULT_LEVEL: &str = "4.0";
/// Default pixel format
pub const DEFAULT_PIX_FMT: &str = "yuv420p";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Fixed vertical output resolution
pub const TARGET_WIDTH: u32 = 1080;
pub const TARGET_HEIGHT: u32 = 1920;
/// Fixed output frame rate
pub const TARGET_FPS: u32 = 30;

/// Output frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TargetFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            fps: TARGET_FPS,
        }
    }
}

/// Mobile-safe encoding profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingProfile {
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// H.264 profile (e.g., "baseline", "main")
    #[serde(default = "default_profile")]
    pub profile: String,

    /// H.264 level
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}
fn default_pix_fmt() -> String {
    DEFAULT_PIX_FMT.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            pix_fmt: DEFAULT_PIX_FMT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

impl EncodingProfile {
    /// Video encoder arguments, including container flags for streaming.
    pub fn video_args(&self, fps: u32) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-profile:v".to_string(),
            self.profile.clone(),
            "-level".to_string(),
            self.level.clone(),
            "-pix_fmt".to_string(),
            self.pix_fmt.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-r".to_string(),
            fps.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }

    /// Audio encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}

/// Outcome of one encoder invocation. Telemetry only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingResult {
    pub stage: String,
    pub success: bool,
    pub output_path: PathBuf,
    /// Last lines of diagnostic output
    pub stderr_tail: Vec<String>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl EncodingResult {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_mobile_safe() {
        let profile = EncodingProfile::default();
        let args = profile.video_args(30);
        assert!(args.windows(2).any(|w| w == ["-profile:v", "baseline"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
    }

    #[test]
    fn test_target_format() {
        let target = TargetFormat::default();
        assert_eq!((target.width, target.height, target.fps), (1080, 1920, 30));
    }

    #[test]
    fn test_result_serializes_elapsed_ms() {
        let result = EncodingResult {
            stage: "overlay".to_string(),
            success: true,
            output_path: PathBuf::from("/tmp/out.mp4"),
            stderr_tail: vec![],
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(result.elapsed_ms(), 1500);
    }
}
