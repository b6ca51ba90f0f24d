use crate::timeline::Caption;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn seconds_to_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hh = total_ms / 3_600_000;
    let mm = (total_ms / 60_000) % 60;
    let ss = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    format!("{hh:02}:{mm:02}:{ss:02},{ms:03}")
}

pub fn render_srt(captions: &[Caption]) -> String {
    let mut out = String::new();
    for (idx, caption) in captions.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            idx + 1,
            seconds_to_timestamp(caption.interval.start),
            seconds_to_timestamp(caption.interval.end),
            caption.text
        );
    }
    out
}

pub async fn write_srt(captions: &[Caption], output_srt: &Path) -> Result<()> {
    if let Some(parent) = output_srt.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    let mut out = fs::File::create(output_srt)
        .await
        .with_context(|| format!("create srt output: {}", output_srt.display()))?;
    out.write_all(render_srt(captions).as_bytes()).await?;
    out.flush().await.ok();
    Ok(())
}
