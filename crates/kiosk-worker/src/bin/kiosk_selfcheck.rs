use std::path::Path;
use std::process::Command;

use kiosk_media::MUSIC_TRACKS;
use kiosk_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "kiosk-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_dir(&config.work_dir).await?;
    ensure_dir(&config.output_dir).await?;
    ensure_tool(&config.ffmpeg)?;
    ensure_tool(&config.ffprobe)?;
    report_music(&config.assets_dir);

    println!("kiosk-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
    Ok(())
}

fn ensure_tool(program: &str) -> anyhow::Result<()> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", program, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            program,
            output.status
        ));
    }
    Ok(())
}

/// Missing tracks only degrade to silent clips, so they are reported, not fatal.
fn report_music(assets_dir: &Path) {
    for (id, file) in MUSIC_TRACKS {
        let path = assets_dir.join(file);
        let state = if path.is_file() { "ok" } else { "missing" };
        println!("kiosk-selfcheck: music {} -> {} [{}]", id, path.display(), state);
    }
}
