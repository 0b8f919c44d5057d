//! Metric names and recording helpers.
//!
//! No recorder is installed by this crate; without one every call is a no-op.

use std::time::Duration;

use ::metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_TOTAL: &str = "kiosk_stage_total";
    pub const STAGE_DURATION_MS: &str = "kiosk_stage_duration_ms";
    pub const FALLBACK_TOTAL: &str = "kiosk_fallback_total";
    pub const ENCODER_RUNS_TOTAL: &str = "kiosk_encoder_runs_total";
    pub const ENCODER_DURATION_MS: &str = "kiosk_encoder_duration_ms";
    pub const JOBS_TOTAL: &str = "kiosk_jobs_total";
    pub const AUDIO_OUTCOME_TOTAL: &str = "kiosk_audio_outcome_total";
}

/// Record one pipeline stage attempt.
pub fn record_stage(stage: &str, outcome: &str, elapsed: Duration) {
    let labels = [
        ("stage", stage.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::STAGE_TOTAL, &labels).increment(1);
    histogram!(names::STAGE_DURATION_MS, "stage" => stage.to_string())
        .record(elapsed.as_millis() as f64);
}

/// Record entry into a fallback strategy.
pub fn record_fallback(strategy: &str) {
    counter!(names::FALLBACK_TOTAL, "strategy" => strategy.to_string()).increment(1);
}

/// Record one external process run.
pub fn record_encoder_run(stage: &str, outcome: &str, elapsed: Duration) {
    let labels = [
        ("stage", stage.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::ENCODER_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::ENCODER_DURATION_MS, "stage" => stage.to_string())
        .record(elapsed.as_millis() as f64);
}

/// Record a finished job.
pub fn record_job(outcome: &str, category: Option<&str>) {
    let labels = [
        ("outcome", outcome.to_string()),
        ("category", category.unwrap_or("none").to_string()),
    ];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
}

/// Record how the audio step ended.
pub fn record_audio_outcome(outcome: &str) {
    counter!(names::AUDIO_OUTCOME_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_stage("single_pass", "success", Duration::from_millis(5));
        record_fallback("normalize");
        record_encoder_run("concatenate", "failed", Duration::ZERO);
        record_job("failed", Some("timeout"));
        record_audio_outcome("skipped");
    }
}
