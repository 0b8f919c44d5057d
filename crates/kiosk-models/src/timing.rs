//! Segment timing.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Slow-motion factor applied to the second segment (2x slower).
pub const SLOWMO_FACTOR: f64 = 2.0;

/// Length of the synthetic clip produced when both durations are zero.
pub const DEGENERATE_CLIP_SECS: f64 = 1.0;

/// Timing validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingError {
    #[error("{field} duration must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} duration must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

/// Durations of the normal-speed and slow-motion segments, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct Timing {
    normal_secs: f64,
    slowmo_secs: f64,
}

impl<'de> Deserialize<'de> for Timing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Fields {
            normal_secs: f64,
            slowmo_secs: f64,
        }

        let fields = Fields::deserialize(deserializer)?;
        Timing::new(fields.normal_secs, fields.slowmo_secs).map_err(serde::de::Error::custom)
    }
}

impl Timing {
    /// Create validated timing.
    pub fn new(normal_secs: f64, slowmo_secs: f64) -> Result<Self, TimingError> {
        check("normal", normal_secs)?;
        check("slowmo", slowmo_secs)?;
        Ok(Self {
            normal_secs,
            slowmo_secs,
        })
    }

    pub fn normal_secs(&self) -> f64 {
        self.normal_secs
    }

    pub fn slowmo_secs(&self) -> f64 {
        self.slowmo_secs
    }

    pub fn has_normal(&self) -> bool {
        self.normal_secs > 0.0
    }

    pub fn has_slowmo(&self) -> bool {
        self.slowmo_secs > 0.0
    }

    /// Both durations are zero; a synthetic clip is produced instead.
    pub fn is_degenerate(&self) -> bool {
        !self.has_normal() && !self.has_slowmo()
    }

    /// Seconds of source video consumed.
    pub fn source_secs(&self) -> f64 {
        if self.is_degenerate() {
            DEGENERATE_CLIP_SECS
        } else {
            self.normal_secs + self.slowmo_secs
        }
    }

    /// Expected duration of the finished clip.
    pub fn expected_output_secs(&self) -> f64 {
        if self.is_degenerate() {
            DEGENERATE_CLIP_SECS
        } else {
            self.normal_secs + SLOWMO_FACTOR * self.slowmo_secs
        }
    }
}

fn check(field: &'static str, value: f64) -> Result<(), TimingError> {
    if !value.is_finite() {
        return Err(TimingError::NotFinite { field, value });
    }
    if value < 0.0 {
        return Err(TimingError::Negative { field, value });
    }
    Ok(())
}
