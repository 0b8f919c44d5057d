//! Machine-readable job summary printed on stdout.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use kiosk_media::PipelineOutput;
use kiosk_models::JobId;

use crate::error::WorkerError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// `single_pass` or `multi_stage:<strategy>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn succeeded(output: &PipelineOutput) -> Self {
        Self {
            job_id: output.job_id.clone(),
            status: JobStatus::Succeeded,
            output_path: Some(output.output_path.clone()),
            strategy: Some(output.strategy.to_string()),
            audio: Some(output.audio.to_string()),
            category: None,
            error: None,
            elapsed_ms: output.elapsed.as_millis() as u64,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(job_id: JobId, error: &WorkerError, elapsed_ms: u64) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            output_path: None,
            strategy: None,
            audio: None,
            category: Some(error.category().to_string()),
            error: Some(error.to_string()),
            elapsed_ms,
            finished_at: Utc::now(),
        }
    }
}
