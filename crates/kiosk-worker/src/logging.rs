//! Structured job logging.
//!
//! Lifecycle lines for one clip job. Every event carries the job id and
//! operation as fields so a job can be followed through interleaved output.

use tracing::{error, info, warn, Span};
use tracing_subscriber::EnvFilter;

use kiosk_media::{AudioOutcome, JobRequest, PipelineOutput, ProducedBy};
use kiosk_models::JobId;

use crate::error::WorkerError;

/// Directives used when `RUST_LOG` is unset or empty.
pub const DEFAULT_LOG_DIRECTIVES: &str = "kiosk_media=info,kiosk_worker=info";

/// Build the subscriber filter. An explicit `RUST_LOG` replaces the defaults
/// entirely, so `kiosk_media=debug` turns on encoder progress lines.
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    let directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LOG_DIRECTIVES);
    EnvFilter::new(directives)
}

/// Logger bound to one job.
///
/// Beyond start and finish, it flags the two degraded outcomes a kiosk
/// operator cares about: the clip came from the multi-stage fallback, or the
/// music could not be applied.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    operation: &'static str,
}

impl JobLogger {
    /// Create a logger for `job_id`.
    ///
    /// # Arguments
    /// * `job_id` - The job being run
    /// * `operation` - What the worker does with it (e.g. "transform")
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.clone(),
            operation,
        }
    }

    /// Log the accepted request: source clip, timing and music choice.
    pub fn log_start(&self, request: &JobRequest) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            video = %request.video_path.display(),
            normal_secs = request.timing.normal_secs(),
            slowmo_secs = request.timing.slowmo_secs(),
            expected_secs = request.timing.expected_output_secs(),
            music = request.style.music.as_deref().unwrap_or("none"),
            "Job started"
        );
    }

    /// Log the finished clip and any degraded path it took.
    pub fn log_completion(&self, output: &PipelineOutput) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            strategy = %output.strategy,
            audio = output.audio.as_str(),
            output = %output.output_path.display(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Job completed"
        );

        if let ProducedBy::MultiStage(strategy) = output.strategy {
            warn!(
                job_id = %self.job_id,
                operation = self.operation,
                strategy = strategy.name(),
                "Clip produced by multi-stage fallback"
            );
        }

        if let AudioOutcome::FellBack { reason } = &output.audio {
            warn!(
                job_id = %self.job_id,
                operation = self.operation,
                reason = %reason,
                "Music not applied, clip delivered without it"
            );
        }
    }

    /// Log a failed job with the category the caller sees.
    pub fn log_failure(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            category = %err.category(),
            exit_code = err.exit_code(),
            error = %err,
            "Job failed"
        );
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Span carrying the job id and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation
        )
    }
}
