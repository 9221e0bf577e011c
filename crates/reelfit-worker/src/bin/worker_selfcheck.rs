use std::path::Path;

use reelfit_media::{check_ffmpeg, check_ffprobe};
use reelfit_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tools()?;
    if std::env::var("PEXELS_API_KEY").is_err() {
        println!("worker-selfcheck: PEXELS_API_KEY not set, search jobs are disabled");
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::NamedTempFile::new_in(path)
        .map_err(|e| anyhow::anyhow!("work dir {} is not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    Ok(())
}
