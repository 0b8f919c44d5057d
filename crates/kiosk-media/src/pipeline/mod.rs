//! Job orchestration.
//!
//! A [`TransformPipeline`] is built for one job and consumed by
//! [`TransformPipeline::run`]. The run tries the fused single-pass encode
//! first; if that fails it walks the normalize strategies and finishes the
//! clip in separate segment, concat and overlay steps. Music is always added
//! last. The job's working directory is removed on every exit path.

mod job;
mod strategy;

pub use job::ProcessingJob;
pub use strategy::{NormalizeStrategy, NORMALIZE_STRATEGIES};

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span, warn, Instrument};

use kiosk_models::{JobId, PipelineStage, StyleConfig, Timing, VideoAsset};

use crate::audio::{AudioMixer, AudioOutcome};
use crate::command::FfmpegCommand;
use crate::concat::concatenate;
use crate::config::PipelineConfig;
use crate::error::{MediaError, MediaResult};
use crate::filter_graph::build_single_pass;
use crate::fs_utils::{move_file, remove_quietly};
use crate::overlay::composite;
use crate::probe::{FfprobeProber, Prober};
use crate::runner::{run_verified, EncodeStep, EncoderRunner, FfmpegRunner};
use crate::segment::SegmentEncoder;
use crate::telemetry;

/// Everything a caller supplies for one clip.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub video_path: PathBuf,
    /// Transparent PNG composited over the whole frame
    pub overlay_path: PathBuf,
    pub style: StyleConfig,
    pub timing: Timing,
}

/// Which path produced the pre-audio video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducedBy {
    SinglePass,
    MultiStage(NormalizeStrategy),
}

impl fmt::Display for ProducedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducedBy::SinglePass => f.write_str("single_pass"),
            ProducedBy::MultiStage(strategy) => write!(f, "multi_stage:{}", strategy),
        }
    }
}

/// A finished clip.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub output_path: PathBuf,
    pub job_id: JobId,
    pub strategy: ProducedBy,
    pub audio: AudioOutcome,
    pub elapsed: Duration,
}

const SINGLE_PASS_FILE: &str = "single_pass.mp4";
const NORMALIZED_FILE: &str = "normalized.mp4";
const JOINED_FILE: &str = "joined.mp4";
const OVERLAID_FILE: &str = "overlaid.mp4";

/// One job's transformation from raw clip to published MP4.
pub struct TransformPipeline {
    config: PipelineConfig,
    request: JobRequest,
    job_id: JobId,
    runner: Arc<dyn EncoderRunner>,
    prober: Arc<dyn Prober>,
}

impl TransformPipeline {
    pub fn new(config: PipelineConfig, request: JobRequest) -> Self {
        let runner = Arc::new(FfmpegRunner::from_config(&config));
        let prober = Arc::new(FfprobeProber::from_config(&config));
        Self {
            config,
            request,
            job_id: JobId::new(),
            runner,
            prober,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn EncoderRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Run the job to completion.
    pub async fn run(self) -> MediaResult<PipelineOutput> {
        let job_id = self.job_id.clone();
        let span = info_span!("kiosk_job", job_id = %job_id);
        let outcome = self.execute().instrument(span).await;

        match &outcome {
            Ok(output) => {
                telemetry::record_job("success", None);
                info!(
                    job_id = %job_id,
                    strategy = %output.strategy,
                    audio = output.audio.as_str(),
                    elapsed_ms = output.elapsed.as_millis() as u64,
                    output = %output.output_path.display(),
                    "Job completed"
                );
            }
            Err(e) => {
                telemetry::record_job("failed", Some(e.category().as_str()));
                error!(
                    job_id = %job_id,
                    category = %e.category(),
                    error = %e,
                    "Job failed"
                );
            }
        }
        outcome
    }

    async fn execute(self) -> MediaResult<PipelineOutput> {
        validate_inputs(&self.job_id, &self.request, &self.config).await?;

        let mut job = ProcessingJob::create(
            self.job_id.clone(),
            &self.config.work_root,
            self.config.single_pass_timeout,
        )?;

        job.set_stage(PipelineStage::Probe);
        let asset = self.prober.probe(&self.request.video_path).await;
        info!(
            rotation = asset.rotation.degrees(),
            aspect = asset.aspect_class.as_str(),
            width = asset.width,
            height = asset.height,
            normal_secs = self.request.timing.normal_secs(),
            slowmo_secs = self.request.timing.slowmo_secs(),
            expected_secs = self.request.timing.expected_output_secs(),
            "Source clip inspected"
        );
        if self.request.timing.is_degenerate() {
            warn!("Both durations are zero, producing a 1 second clip");
        }

        let (video, produced_by) = match self.single_pass(&mut job, &asset).await {
            Ok(path) => (path, ProducedBy::SinglePass),
            Err(e) => {
                warn!(
                    category = %e.category(),
                    error = %e,
                    "Single pass failed, falling back to multi-stage"
                );
                let (path, strategy) = self.multi_stage(&mut job, &asset).await?;
                (path, ProducedBy::MultiStage(strategy))
            }
        };

        job.set_stage(PipelineStage::AudioMix);
        let (final_path, audio) = AudioMixer::new(self.runner.as_ref(), &self.config)
            .apply(&video, &self.request.style, job.work_dir())
            .await;

        job.set_stage(PipelineStage::Finalize);
        let output_path = self.config.output_dir.join(format!("{}.mp4", job.id));
        move_file(&final_path, &output_path).await?;

        job.set_stage(PipelineStage::Done);
        let elapsed = job.elapsed();
        if let Err(e) = job.cleanup() {
            warn!(error = %e, "Failed to remove working directory");
        }

        Ok(PipelineOutput {
            output_path,
            job_id: self.job_id,
            strategy: produced_by,
            audio,
            elapsed,
        })
    }

    async fn single_pass(
        &self,
        job: &mut ProcessingJob,
        asset: &VideoAsset,
    ) -> MediaResult<PathBuf> {
        job.set_stage(PipelineStage::SinglePass);
        let timing = &self.request.timing;
        let output = job.file(SINGLE_PASS_FILE);

        let plan = build_single_pass(
            timing,
            Some(asset.rotation),
            asset.scale_mode(),
            self.config.target,
        );
        let command = FfmpegCommand::new(&self.request.video_path, &output)
            .duration(plan.input_duration)
            .no_autorotate()
            .add_input(&self.request.overlay_path)
            .filter_graph(&plan.graph)
            .map(plan.map_arg())
            .no_audio()
            .encoding(&self.config.encoding, self.config.target.fps);
        let step = EncodeStep::new(PipelineStage::SinglePass, command, job.timeout())
            .expecting(timing.expected_output_secs());

        match timed(PipelineStage::SinglePass, run_verified(self.runner.as_ref(), &step)).await {
            Ok(_) => Ok(output),
            Err(e) => {
                remove_quietly(&output).await;
                Err(e)
            }
        }
    }

    async fn multi_stage(
        &self,
        job: &mut ProcessingJob,
        asset: &VideoAsset,
    ) -> MediaResult<(PathBuf, NormalizeStrategy)> {
        let timing = &self.request.timing;
        let normalized = job.file(NORMALIZED_FILE);

        let strategy = self.normalize(job, asset, &normalized).await?;

        job.set_stage(PipelineStage::Segment);
        let segments = timed(
            PipelineStage::Segment,
            SegmentEncoder::new(self.runner.as_ref(), &self.config).encode(
                &normalized,
                timing,
                job.work_dir(),
            ),
        )
        .await?;

        job.set_stage(PipelineStage::Concatenate);
        let joined = job.file(JOINED_FILE);
        timed(
            PipelineStage::Concatenate,
            concatenate(
                self.runner.as_ref(),
                &self.config,
                &segments,
                job.work_dir(),
                &joined,
            ),
        )
        .await?;
        remove_quietly(&normalized).await;

        job.set_stage(PipelineStage::Overlay);
        let overlaid = job.file(OVERLAID_FILE);
        timed(
            PipelineStage::Overlay,
            composite(
                self.runner.as_ref(),
                &self.config,
                &joined,
                &self.request.overlay_path,
                &overlaid,
            ),
        )
        .await?;
        remove_quietly(&joined).await;

        Ok((overlaid, strategy))
    }

    /// First strategy that yields a verified intermediate.
    async fn normalize(
        &self,
        job: &mut ProcessingJob,
        asset: &VideoAsset,
        output: &Path,
    ) -> MediaResult<NormalizeStrategy> {
        let mut attempted = Vec::with_capacity(NORMALIZE_STRATEGIES.len());
        let mut last_error = None;

        for strategy in NORMALIZE_STRATEGIES {
            job.set_stage(strategy.stage());
            telemetry::record_fallback(strategy.name());
            info!(strategy = strategy.name(), "Trying normalize strategy");

            let step = EncodeStep::new(
                strategy.stage(),
                strategy.command(&self.config, asset, &self.request.timing, output),
                self.config.stage_timeout,
            )
            .expecting(self.request.timing.source_secs());

            match timed(strategy.stage(), run_verified(self.runner.as_ref(), &step)).await {
                Ok(_) => {
                    info!(strategy = strategy.name(), "Normalize strategy succeeded");
                    return Ok(strategy);
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        category = %e.category(),
                        error = %e,
                        "Normalize strategy failed"
                    );
                    remove_quietly(output).await;
                    attempted.push(strategy.name().to_string());
                    last_error = Some(e);
                }
            }
        }

        Err(MediaError::StrategiesExhausted {
            attempted,
            source: Box::new(
                last_error.unwrap_or_else(|| MediaError::internal("no normalize strategy ran")),
            ),
        })
    }
}

/// Reject unusable inputs before any work directory exists.
async fn validate_inputs(
    job_id: &JobId,
    request: &JobRequest,
    config: &PipelineConfig,
) -> MediaResult<()> {
    // The id names the published file.
    if !job_id.is_path_safe() {
        return Err(MediaError::invalid_input(format!(
            "job id {:?} may only contain letters, digits, '-' and '_'",
            job_id.as_str()
        )));
    }

    let video = tokio::fs::metadata(&request.video_path)
        .await
        .map_err(|_| MediaError::FileNotFound(request.video_path.clone()))?;
    if !video.is_file() {
        return Err(MediaError::FileNotFound(request.video_path.clone()));
    }
    if video.len() < config.min_input_bytes {
        return Err(MediaError::invalid_input(format!(
            "video is {} bytes, expected at least {}",
            video.len(),
            config.min_input_bytes
        )));
    }

    let overlay = tokio::fs::metadata(&request.overlay_path)
        .await
        .map_err(|_| MediaError::FileNotFound(request.overlay_path.clone()))?;
    if !overlay.is_file() || overlay.len() == 0 {
        return Err(MediaError::invalid_input(format!(
            "overlay {} is empty",
            request.overlay_path.display()
        )));
    }
    Ok(())
}

/// Await a stage, logging and recording its outcome.
async fn timed<T, F>(stage: PipelineStage, fut: F) -> MediaResult<T>
where
    F: Future<Output = MediaResult<T>>,
{
    let start = Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed();

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) if e.is_timeout() => "timeout",
        Err(_) => "failed",
    };
    telemetry::record_stage(stage.as_str(), outcome, elapsed);
    info!(
        stage = stage.as_str(),
        outcome,
        elapsed_ms = elapsed.as_millis() as u64,
        "Stage finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use async_trait::async_trait;
    use kiosk_models::{EncodingResult, Rotation, ScaleMode};
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// What the fake does for a stage.
    #[derive(Clone, Copy)]
    enum Behavior {
        Fail,
        TimeOut,
        EmptyOutput,
    }

    #[derive(Default)]
    struct FakeRunner {
        behaviors: HashMap<PipelineStage, Behavior>,
        calls: Mutex<Vec<(PipelineStage, String, Option<f64>)>>,
    }

    impl FakeRunner {
        fn with(mut self, stage: PipelineStage, behavior: Behavior) -> Self {
            self.behaviors.insert(stage, behavior);
            self
        }

        fn stages(&self) -> Vec<PipelineStage> {
            self.calls.lock().unwrap().iter().map(|c| c.0).collect()
        }

        fn args_for(&self, stage: PipelineStage) -> String {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.0 == stage)
                .map(|c| c.1.clone())
                .unwrap()
        }

        fn expected_for(&self, stage: PipelineStage) -> Option<f64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.0 == stage)
                .and_then(|c| c.2)
        }
    }

    #[async_trait]
    impl EncoderRunner for FakeRunner {
        async fn run(&self, step: &EncodeStep) -> MediaResult<EncodingResult> {
            self.calls.lock().unwrap().push((
                step.stage,
                step.command.build_args().join(" "),
                step.expected_secs,
            ));
            match self.behaviors.get(&step.stage) {
                Some(Behavior::Fail) => {
                    return Err(MediaError::ffmpeg_failed("fake failure", None, Some(1)))
                }
                Some(Behavior::TimeOut) => {
                    return Err(MediaError::timeout(step.stage.as_str(), 10))
                }
                Some(Behavior::EmptyOutput) => {
                    tokio::fs::write(step.command.output(), b"").await?;
                }
                None => {
                    tokio::fs::write(step.command.output(), b"fake video").await?;
                }
            }
            Ok(EncodingResult {
                stage: step.stage.as_str().to_string(),
                success: true,
                output_path: step.command.output().to_path_buf(),
                stderr_tail: Vec::new(),
                elapsed: Duration::from_millis(1),
            })
        }
    }

    struct FixedProber {
        width: u32,
        height: u32,
        rotation: Rotation,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, path: &Path) -> VideoAsset {
            VideoAsset::new(path, self.width, self.height, self.rotation)
        }
    }

    struct Fixture {
        _root: TempDir,
        work_root: PathBuf,
        output_dir: PathBuf,
        config: PipelineConfig,
        video: PathBuf,
        overlay: PathBuf,
    }

    async fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let work_root = root.path().join("work");
        let output_dir = root.path().join("out");
        let assets = root.path().join("assets");
        tokio::fs::create_dir_all(&assets).await.unwrap();
        tokio::fs::write(assets.join("track_b.mp3"), b"music").await.unwrap();

        let video = root.path().join("raw.mp4");
        tokio::fs::write(&video, vec![0u8; 4096]).await.unwrap();
        let overlay = root.path().join("frame.png");
        tokio::fs::write(&overlay, b"png").await.unwrap();

        let config = PipelineConfig::default()
            .with_work_root(&work_root)
            .with_output_dir(&output_dir)
            .with_assets_dir(&assets);

        Fixture {
            _root: root,
            work_root,
            output_dir,
            config,
            video,
            overlay,
        }
    }

    fn request(fx: &Fixture, n: f64, s: f64, music: &str) -> JobRequest {
        JobRequest {
            video_path: fx.video.clone(),
            overlay_path: fx.overlay.clone(),
            style: StyleConfig::default().with_music(music),
            timing: Timing::new(n, s).unwrap(),
        }
    }

    fn landscape() -> Arc<FixedProber> {
        Arc::new(FixedProber {
            width: 1920,
            height: 1080,
            rotation: Rotation::None,
        })
    }

    /// Log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn work_root_is_empty(fx: &Fixture) -> bool {
        std::fs::read_dir(&fx.work_root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    async fn run(
        fx: &Fixture,
        req: JobRequest,
        runner: Arc<FakeRunner>,
        prober: Arc<FixedProber>,
    ) -> MediaResult<PipelineOutput> {
        TransformPipeline::new(fx.config.clone(), req)
            .with_runner(runner)
            .with_prober(prober)
            .run()
            .await
    }

    #[tokio::test]
    async fn test_single_pass_success() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());

        let output = run(&fx, request(&fx, 3.0, 2.0, "none"), runner.clone(), landscape())
            .await
            .unwrap();

        assert_eq!(runner.stages(), vec![PipelineStage::SinglePass]);
        assert_eq!(output.strategy, ProducedBy::SinglePass);
        assert_eq!(output.audio, AudioOutcome::Skipped);
        assert_eq!(
            output.output_path,
            fx.output_dir.join(format!("{}.mp4", output.job_id))
        );
        assert!(output.output_path.exists());
        assert!(work_root_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_rotated_widescreen_scenario() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());
        // Coded 16:9, rotated 90 on capture
        let prober = Arc::new(FixedProber {
            width: 1920,
            height: 1080,
            rotation: Rotation::Cw90,
        });

        let output = run(&fx, request(&fx, 5.0, 5.0, "none"), runner.clone(), prober)
            .await
            .unwrap();

        assert_eq!(output.strategy, ProducedBy::SinglePass);
        let args = runner.args_for(PipelineStage::SinglePass);
        assert!(args.contains("transpose=1"));
        assert!(args.contains("-noautorotate"));
        assert!(args.contains("-t 10.000"));
        assert!(args.contains("-an"));
        assert_eq!(runner.expected_for(PipelineStage::SinglePass), Some(15.0));
    }

    #[tokio::test]
    async fn test_legacy_clip_with_missing_track() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());
        let prober = Arc::new(FixedProber {
            width: 640,
            height: 480,
            rotation: Rotation::None,
        });
        assert_eq!(
            VideoAsset::new("x", 640, 480, Rotation::None).scale_mode(),
            ScaleMode::Crop
        );

        let output = run(&fx, request(&fx, 6.0, 0.0, "trackA"), runner.clone(), prober)
            .await
            .unwrap();

        let args = runner.args_for(PipelineStage::SinglePass);
        assert!(args.contains("crop=1080:1920"));
        assert!(args.contains("trim=start=0.000:end=6.000"));
        assert!(!args.contains("split"));
        assert_eq!(runner.expected_for(PipelineStage::SinglePass), Some(6.0));
        assert!(matches!(output.audio, AudioOutcome::FellBack { .. }));
        assert!(!runner.stages().contains(&PipelineStage::AudioMix));
        assert!(output.output_path.exists());
    }

    #[tokio::test]
    async fn test_fallback_order() {
        let fx = fixture().await;
        let runner = Arc::new(
            FakeRunner::default()
                .with(PipelineStage::SinglePass, Behavior::TimeOut)
                .with(PipelineStage::Normalize, Behavior::Fail)
                .with(PipelineStage::NormalizeAutorotate, Behavior::EmptyOutput),
        );

        let output = run(&fx, request(&fx, 3.0, 2.0, "none"), runner.clone(), landscape())
            .await
            .unwrap();

        assert_eq!(
            runner.stages(),
            vec![
                PipelineStage::SinglePass,
                PipelineStage::Normalize,
                PipelineStage::NormalizeAutorotate,
                PipelineStage::NormalizeNoRotation,
                PipelineStage::Segment,
                PipelineStage::Segment,
                PipelineStage::Concatenate,
                PipelineStage::Overlay,
            ]
        );
        assert_eq!(
            output.strategy,
            ProducedBy::MultiStage(NormalizeStrategy::NoRotation)
        );
        assert_eq!(output.strategy.to_string(), "multi_stage:normalize_no_rotation");
        assert!(work_root_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_fallback_transitions_are_logged() {
        let fx = fixture().await;
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runner = Arc::new(
            FakeRunner::default()
                .with(PipelineStage::SinglePass, Behavior::TimeOut)
                .with(PipelineStage::Normalize, Behavior::Fail)
                .with(PipelineStage::NormalizeAutorotate, Behavior::Fail),
        );
        run(&fx, request(&fx, 3.0, 2.0, "none"), runner, landscape())
            .await
            .unwrap();

        let logs = capture.contents();
        let fell_back = logs
            .find("Single pass failed, falling back to multi-stage")
            .unwrap();
        let first_try = logs.find("Trying normalize strategy").unwrap();
        assert!(fell_back < first_try);

        let failed: Vec<&str> = logs
            .lines()
            .filter(|l| l.contains("Normalize strategy failed"))
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed[1].contains("normalize_autorotate"));

        let succeeded = logs
            .lines()
            .find(|l| l.contains("Normalize strategy succeeded"))
            .unwrap();
        assert!(succeeded.contains("normalize_no_rotation"));
        assert!(logs.contains("Job completed"));
    }

    #[tokio::test]
    async fn test_first_normalize_success_stops_chain() {
        let fx = fixture().await;
        let runner =
            Arc::new(FakeRunner::default().with(PipelineStage::SinglePass, Behavior::Fail));

        let output = run(&fx, request(&fx, 4.0, 0.0, "none"), runner.clone(), landscape())
            .await
            .unwrap();

        assert_eq!(
            runner.stages(),
            vec![
                PipelineStage::SinglePass,
                PipelineStage::Normalize,
                PipelineStage::Segment,
                PipelineStage::Concatenate,
                PipelineStage::Overlay,
            ]
        );
        assert_eq!(
            output.strategy,
            ProducedBy::MultiStage(NormalizeStrategy::ComputedRotation)
        );
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal_and_cleans_up() {
        let fx = fixture().await;
        let runner = Arc::new(
            FakeRunner::default()
                .with(PipelineStage::SinglePass, Behavior::Fail)
                .with(PipelineStage::Normalize, Behavior::Fail)
                .with(PipelineStage::NormalizeAutorotate, Behavior::Fail)
                .with(PipelineStage::NormalizeNoRotation, Behavior::TimeOut),
        );

        let err = run(&fx, request(&fx, 3.0, 2.0, "trackB"), runner.clone(), landscape())
            .await
            .unwrap_err();

        match &err {
            MediaError::StrategiesExhausted { attempted, .. } => assert_eq!(
                attempted,
                &["normalize", "normalize_autorotate", "normalize_no_rotation"]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(!runner.stages().contains(&PipelineStage::Segment));
        assert!(!runner.stages().contains(&PipelineStage::AudioMix));
        assert!(work_root_is_empty(&fx));
        assert!(!fx.output_dir.exists());
    }

    #[tokio::test]
    async fn test_concat_failure_is_fatal() {
        let fx = fixture().await;
        let runner = Arc::new(
            FakeRunner::default()
                .with(PipelineStage::SinglePass, Behavior::Fail)
                .with(PipelineStage::Concatenate, Behavior::Fail),
        );

        let err = run(&fx, request(&fx, 3.0, 2.0, "none"), runner, landscape())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Encoding);
        assert!(work_root_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_music_mixed_last() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());

        let output = run(&fx, request(&fx, 3.0, 2.0, "trackB"), runner.clone(), landscape())
            .await
            .unwrap();

        assert_eq!(
            runner.stages(),
            vec![PipelineStage::SinglePass, PipelineStage::AudioMix]
        );
        assert_eq!(
            output.audio,
            AudioOutcome::Mixed {
                track: "trackB".to_string()
            }
        );
        let mix = runner.args_for(PipelineStage::AudioMix);
        assert!(mix.contains("single_pass.mp4"));
    }

    #[tokio::test]
    async fn test_unknown_music_still_succeeds() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());

        let output = run(&fx, request(&fx, 3.0, 0.0, "kazoo"), runner.clone(), landscape())
            .await
            .unwrap();
        assert!(matches!(output.audio, AudioOutcome::FellBack { .. }));
        assert!(output.output_path.exists());
    }

    #[tokio::test]
    async fn test_audio_failure_keeps_video() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default().with(PipelineStage::AudioMix, Behavior::Fail));

        let output = run(&fx, request(&fx, 3.0, 0.0, "trackB"), runner, landscape())
            .await
            .unwrap();
        assert!(matches!(output.audio, AudioOutcome::FellBack { .. }));
        assert!(output.output_path.exists());
    }

    #[tokio::test]
    async fn test_small_video_rejected_before_work() {
        let fx = fixture().await;
        tokio::fs::write(&fx.video, b"tiny").await.unwrap();
        let runner = Arc::new(FakeRunner::default());

        let err = run(&fx, request(&fx, 3.0, 2.0, "none"), runner.clone(), landscape())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(runner.stages().is_empty());
        assert!(!fx.work_root.exists());
    }

    #[tokio::test]
    async fn test_unsafe_job_id_rejected_before_work() {
        let fx = fixture().await;

        for id in ["abcdefgh/../../../escaped", "aéééééééé", ""] {
            let runner = Arc::new(FakeRunner::default());
            let err = TransformPipeline::new(fx.config.clone(), request(&fx, 3.0, 2.0, "none"))
                .with_job_id(JobId::from_string(id))
                .with_runner(runner.clone())
                .with_prober(landscape())
                .run()
                .await
                .unwrap_err();

            assert_eq!(err.category(), ErrorCategory::InvalidInput, "id {id:?}");
            assert!(runner.stages().is_empty());
        }
        assert!(!fx.work_root.exists());
        assert!(!fx.output_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_overlay_rejected() {
        let fx = fixture().await;
        tokio::fs::remove_file(&fx.overlay).await.unwrap();

        let err = run(
            &fx,
            request(&fx, 3.0, 2.0, "none"),
            Arc::new(FakeRunner::default()),
            landscape(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[tokio::test]
    async fn test_degenerate_timing_produces_one_second() {
        let fx = fixture().await;
        let runner = Arc::new(FakeRunner::default());

        run(&fx, request(&fx, 0.0, 0.0, "none"), runner.clone(), landscape())
            .await
            .unwrap();
        let args = runner.args_for(PipelineStage::SinglePass);
        assert!(args.contains("trim=start=0.000:end=1.000"));
        assert_eq!(runner.expected_for(PipelineStage::SinglePass), Some(1.0));
    }
}
