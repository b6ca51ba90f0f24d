use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

fn required_dirs(cfg: &Config) -> [PathBuf; 4] {
    [
        cfg.work_dir.clone(),
        cfg.audio_dir(),
        cfg.footage_dir(),
        cfg.output_dir.clone(),
    ]
}

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in required_dirs(cfg) {
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Empties `dir_path` without removing the directory itself.
pub async fn clear_directory_contents(dir_path: &Path) -> Result<()> {
    if !fs::try_exists(dir_path).await.unwrap_or(false) {
        return Ok(());
    }

    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        if let Err(err) = removed {
            logw(format!("Could not remove {}: {err}", path.display()));
        }
    }

    Ok(())
}

/// Directory setup before the first run: create everything and drop footage
/// left over from earlier renders.
pub async fn prepare_workspace(cfg: &Config) -> Result<()> {
    ensure_directories(cfg).await?;
    clear_directory_contents(&cfg.footage_dir()).await
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
