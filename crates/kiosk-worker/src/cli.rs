//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use kiosk_media::JobRequest;
use kiosk_models::{StyleConfig, Timing};

use crate::error::{WorkerError, WorkerResult};

#[derive(Parser, Debug)]
#[command(name = "kiosk-worker", version, about = "Turn a kiosk recording into a finished clip")]
pub struct Cli {
    /// Raw recorded clip.
    #[arg(long)]
    pub video: PathBuf,

    /// Transparent PNG overlay, same aspect as the output.
    #[arg(long)]
    pub overlay: PathBuf,

    /// Seconds played at normal speed.
    #[arg(long, default_value_t = 0.0)]
    pub normal: f64,

    /// Seconds played in slow motion (output length doubles).
    #[arg(long, default_value_t = 0.0)]
    pub slowmo: f64,

    /// Style JSON as posted by the kiosk UI.
    #[arg(long)]
    pub style: Option<PathBuf>,

    /// Music identifier; overrides the style file's.
    #[arg(long)]
    pub music: Option<String>,

    /// Where the finished clip is written; overrides KIOSK_OUTPUT_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Job identifier; a random one is generated when absent.
    #[arg(long)]
    pub job_id: Option<String>,
}

impl Cli {
    /// Load the style file (if any) and apply `--music`.
    pub async fn style_config(&self) -> WorkerResult<StyleConfig> {
        let mut style = match &self.style {
            Some(path) => {
                let raw = tokio::fs::read(path)
                    .await
                    .map_err(|source| WorkerError::StyleFile {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_slice(&raw)?
            }
            None => StyleConfig::default(),
        };
        if let Some(music) = &self.music {
            style = style.with_music(music.clone());
        }
        Ok(style)
    }

    pub async fn job_request(&self) -> WorkerResult<JobRequest> {
        Ok(JobRequest {
            video_path: self.video.clone(),
            overlay_path: self.overlay.clone(),
            style: self.style_config().await?,
            timing: Timing::new(self.normal, self.slowmo)?,
        })
    }
}
