//! Kiosk clip worker.
//!
//! Turns command-line arguments and `KIOSK_*` environment settings into one
//! [`TransformPipeline`] run and a [`JobReport`].

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;

use std::time::Instant;

use tracing::Instrument;

use kiosk_media::{PipelineOutput, TransformPipeline};
use kiosk_models::JobId;

pub use cli::Cli;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use report::{JobReport, JobStatus};

/// Run one job described by `cli` and summarize it.
pub async fn run_job(
    config: &WorkerConfig,
    cli: &Cli,
) -> Result<JobReport, (JobReport, WorkerError)> {
    let started = Instant::now();
    let job_id = cli
        .job_id
        .clone()
        .map(JobId::from_string)
        .unwrap_or_default();
    let logger = JobLogger::new(&job_id, "transform");

    let outcome = execute(config, cli, job_id.clone(), &logger)
        .instrument(logger.create_span())
        .await;

    match outcome {
        Ok(output) => {
            logger.log_completion(&output);
            Ok(JobReport::succeeded(&output))
        }
        Err(e) => {
            logger.log_failure(&e);
            let report = JobReport::failed(job_id, &e, started.elapsed().as_millis() as u64);
            Err((report, e))
        }
    }
}

async fn execute(
    config: &WorkerConfig,
    cli: &Cli,
    job_id: JobId,
    logger: &JobLogger,
) -> WorkerResult<PipelineOutput> {
    // The id becomes the published file name.
    if !job_id.is_path_safe() {
        return Err(WorkerError::invalid_args(format!(
            "--job-id {:?} may only contain letters, digits, '-' and '_'",
            job_id.as_str()
        )));
    }

    let request = cli.job_request().await?;
    logger.log_start(&request);

    let mut pipeline_config = config.pipeline_config();
    if let Some(dir) = &cli.output_dir {
        pipeline_config = pipeline_config.with_output_dir(dir);
    }

    let output = TransformPipeline::new(pipeline_config, request)
        .with_job_id(job_id)
        .run()
        .await?;
    Ok(output)
}
