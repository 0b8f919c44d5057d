//! Encoder invocation seam.
//!
//! Stages describe what to run as an [`EncodeStep`]; an [`EncoderRunner`]
//! decides how. [`FfmpegRunner`] is the real implementation and goes through
//! the [`ProcessWatchdog`]; tests substitute their own runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use kiosk_models::{EncodingResult, PipelineStage};

use crate::command::{check_program, FfmpegCommand};
use crate::config::PipelineConfig;
use crate::error::MediaResult;
use crate::fs_utils::verify_output;
use crate::watchdog::{platform_terminator, Invocation, ProcessWatchdog, TreeTerminator};

/// One encoder invocation with its budget.
#[derive(Debug, Clone)]
pub struct EncodeStep {
    pub stage: PipelineStage,
    pub command: FfmpegCommand,
    pub timeout: Duration,
    /// Expected output length, for progress reporting
    pub expected_secs: Option<f64>,
}

impl EncodeStep {
    pub fn new(stage: PipelineStage, command: FfmpegCommand, timeout: Duration) -> Self {
        Self {
            stage,
            command,
            timeout,
            expected_secs: None,
        }
    }

    pub fn expecting(mut self, secs: f64) -> Self {
        self.expected_secs = Some(secs);
        self
    }
}

/// Runs encoder steps.
#[async_trait]
pub trait EncoderRunner: Send + Sync {
    async fn run(&self, step: &EncodeStep) -> MediaResult<EncodingResult>;
}

/// Runs FFmpeg under a watchdog.
pub struct FfmpegRunner {
    program: String,
    kill_grace: Duration,
    terminator: Arc<dyn TreeTerminator>,
}

impl FfmpegRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            kill_grace: Duration::from_secs(2),
            terminator: platform_terminator(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ffmpeg_program.clone()).with_kill_grace(config.kill_grace)
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_terminator(mut self, terminator: Arc<dyn TreeTerminator>) -> Self {
        self.terminator = terminator;
        self
    }
}

#[async_trait]
impl EncoderRunner for FfmpegRunner {
    async fn run(&self, step: &EncodeStep) -> MediaResult<EncodingResult> {
        let program = check_program(&self.program)?;

        let mut invocation = Invocation::new(
            step.stage.as_str(),
            program.to_string_lossy(),
            step.command.build_args(),
        );
        if let Some(secs) = step.expected_secs {
            invocation = invocation.with_expected_duration(secs);
        }

        let watchdog = ProcessWatchdog::new(step.timeout)
            .with_grace(self.kill_grace)
            .with_terminator(self.terminator.clone());

        let mut result = watchdog.run(&invocation).await?;
        result.output_path = step.command.output().to_path_buf();
        Ok(result)
    }
}

/// Run a step and require a non-empty output file.
pub async fn run_verified(
    runner: &dyn EncoderRunner,
    step: &EncodeStep,
) -> MediaResult<EncodingResult> {
    let result = runner.run(step).await?;
    let bytes = verify_output(step.command.output()).await?;
    debug!(
        stage = step.stage.as_str(),
        bytes,
        elapsed_ms = result.elapsed_ms(),
        "Stage output verified"
    );
    Ok(result)
}
