//! Style configuration supplied by the kiosk.
//!
//! The pipeline only reads these values. Frame, text and font are already
//! baked into the overlay image by the renderer; they are carried here so
//! job logs describe the full request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default font identifier used by the overlay renderer.
pub const DEFAULT_FONT: &str = "sans";
/// Default overlay text color.
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

/// Music identifier meaning "no background track".
pub const MUSIC_NONE: &str = "none";

/// Style selection for one clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    /// Background music identifier ("none" or absent for no music)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,

    /// Decorative frame identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,

    /// Custom frame color (CSS hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,

    /// Caption text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Font identifier
    #[serde(default = "default_font")]
    pub font: String,

    /// Caption color (CSS hex)
    #[serde(default = "default_text_color")]
    pub text_color: String,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            music: None,
            frame: None,
            custom_color: None,
            text: None,
            font: DEFAULT_FONT.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
        }
    }
}

impl StyleConfig {
    /// Returns a new config with the given music identifier.
    pub fn with_music(mut self, music: impl Into<String>) -> Self {
        self.music = Some(music.into());
        self
    }

    /// Interpret the music field.
    pub fn music_choice(&self) -> MusicChoice {
        match self.music.as_deref().map(str::trim) {
            None | Some("") => MusicChoice::Silent,
            Some(id) if id.eq_ignore_ascii_case(MUSIC_NONE) => MusicChoice::Silent,
            Some(id) => MusicChoice::Track(id.to_string()),
        }
    }
}

/// Resolved music selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicChoice {
    /// No background track requested
    Silent,
    /// Track identifier to look up in the asset table
    Track(String),
}
