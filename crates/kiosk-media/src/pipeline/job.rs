//! Per-job state and working directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::debug;

use kiosk_models::{JobId, PipelineStage};

use crate::error::MediaResult;

/// One orchestration run.
///
/// The working directory is removed when this value is dropped, whichever
/// way the run ends.
#[derive(Debug)]
pub struct ProcessingJob {
    pub id: JobId,
    work_dir: TempDir,
    stage: PipelineStage,
    timeout: Duration,
    started: Instant,
}

impl ProcessingJob {
    /// Create a fresh working directory under `work_root`.
    pub fn create(id: JobId, work_root: &Path, timeout: Duration) -> MediaResult<Self> {
        std::fs::create_dir_all(work_root)?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", id.short()))
            .tempdir_in(work_root)?;
        debug!(job_id = %id, work_dir = %work_dir.path().display(), "Working directory created");

        Ok(Self {
            id,
            work_dir,
            stage: PipelineStage::Created,
            timeout,
            started: Instant::now(),
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Path of a file inside the working directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.work_dir.path().join(name)
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: PipelineStage) {
        debug!(job_id = %self.id, from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remove the working directory now, reporting errors.
    pub fn cleanup(self) -> MediaResult<()> {
        self.work_dir.close()?;
        Ok(())
    }
}
