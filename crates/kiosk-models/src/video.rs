//! Probed video properties.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Aspect ratio treated as legacy 4:3.
const LEGACY_RATIO: f64 = 4.0 / 3.0;
/// Tolerance band around 4:3 (and 3:4).
pub const LEGACY_RATIO_TOLERANCE: f64 = 0.08;

/// Clockwise rotation needed to display the stream upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "90")]
    Cw90,
    #[serde(rename = "180")]
    Half,
    #[serde(rename = "270")]
    Cw270,
}

impl Rotation {
    /// Normalize an arbitrary angle to the nearest quarter turn.
    pub fn from_degrees(degrees: f64) -> Self {
        if !degrees.is_finite() {
            return Rotation::None;
        }
        let quarter = (degrees / 90.0).round() as i64;
        match quarter.rem_euclid(4) {
            1 => Rotation::Cw90,
            2 => Rotation::Half,
            3 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    /// Convert a display-matrix rotation (counter-clockwise positive) to the
    /// equivalent rotate-tag angle.
    pub fn from_display_matrix(degrees: f64) -> Self {
        Self::from_degrees(-degrees)
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Half => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Whether displaying upright swaps width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Aspect classification of the displayed (upright) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectClass {
    /// Landscape wider than 4:3 (typically 16:9)
    Widescreen,
    /// Approximately 4:3 in either orientation
    Legacy4x3,
    /// Already portrait
    Vertical,
    /// Dimensions not known
    #[default]
    Unknown,
}

impl AspectClass {
    /// Classify display dimensions.
    pub fn classify(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return AspectClass::Unknown;
        }
        let ratio = width as f64 / height as f64;
        if (ratio - LEGACY_RATIO).abs() <= LEGACY_RATIO_TOLERANCE
            || (ratio - 1.0 / LEGACY_RATIO).abs() <= LEGACY_RATIO_TOLERANCE
        {
            AspectClass::Legacy4x3
        } else if height > width {
            AspectClass::Vertical
        } else {
            AspectClass::Widescreen
        }
    }

    /// How the frame is fitted into the vertical target.
    pub fn scale_mode(&self) -> ScaleMode {
        match self {
            AspectClass::Legacy4x3 => ScaleMode::Crop,
            _ => ScaleMode::Pad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectClass::Widescreen => "widescreen",
            AspectClass::Legacy4x3 => "legacy_4x3",
            AspectClass::Vertical => "vertical",
            AspectClass::Unknown => "unknown",
        }
    }
}

/// Fit strategy for the target frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Scale up and center-crop
    Crop,
    /// Scale down and pad with black bars
    Pad,
}

/// A probed video file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    pub path: PathBuf,
    /// Coded width in pixels (0 if unknown)
    pub width: u32,
    /// Coded height in pixels (0 if unknown)
    pub height: u32,
    pub rotation: Rotation,
    pub aspect_class: AspectClass,
}

impl VideoAsset {
    /// Build from coded dimensions and rotation, classifying the upright frame.
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, rotation: Rotation) -> Self {
        let (dw, dh) = if rotation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };
        Self {
            path: path.into(),
            width,
            height,
            rotation,
            aspect_class: AspectClass::classify(dw, dh),
        }
    }

    /// Safe defaults used when probing fails.
    pub fn unprobed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            width: 0,
            height: 0,
            rotation: Rotation::None,
            aspect_class: AspectClass::Unknown,
        }
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.aspect_class.scale_mode()
    }
}
