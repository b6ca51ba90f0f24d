use crate::config::Config;
use crate::services::Renderer;
use crate::srt;
use crate::timeline::{Caption, FootageSegment};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

pub const OUTPUT_WIDTH: u32 = 1920;
pub const OUTPUT_HEIGHT: u32 = 1080;
pub const OUTPUT_FPS: u32 = 30;
const MIN_SEGMENT_SECS: f64 = 0.05;
const SUBTITLE_STYLE: &str =
    "FontName=Arial,Fontsize=22,PrimaryColour=&H0000FFFF,OutlineColour=&H00000000,BorderStyle=1,Outline=2,Alignment=2,MarginV=40";

async fn run_cmd(args: &[String]) -> Result<()> {
    let Some((program, rest)) = args.split_first() else {
        return Ok(());
    };

    let output = Command::new(program)
        .args(rest)
        .output()
        .await
        .with_context(|| format!("Failed to start {program}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        anyhow::bail!("{program} failed ({}): {}", output.status, tail.join(" | "));
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed for {}", path.display());
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        anyhow::bail!("Invalid duration for {}", path.display());
    }
    Ok(duration)
}

fn base_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn x264_args() -> Vec<String> {
    ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "veryfast", "-crf", "22"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Escapes a path for use as a filter option value.
pub fn escape_filter_path(path: &Path) -> String {
    let mut out = String::new();
    for ch in path.to_string_lossy().chars() {
        match ch {
            '\\' => out.push('/'),
            ':' | '\'' | ',' | ';' | '[' | ']' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Contents of a concat demuxer list.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

fn scale_filter() -> String {
    format!(
        "scale={OUTPUT_WIDTH}:{OUTPUT_HEIGHT}:force_original_aspect_ratio=increase,crop={OUTPUT_WIDTH}:{OUTPUT_HEIGHT},fps={OUTPUT_FPS},setsar=1"
    )
}

/// Cuts `duration` seconds of `source` to the output frame, looping the
/// source when it is shorter than the slot.
pub fn segment_args(source: &Path, duration: f64, loop_source: bool, out: &Path) -> Vec<String> {
    let mut args = base_args();
    if loop_source {
        args.extend(["-stream_loop".to_string(), "-1".to_string()]);
    }
    args.extend([
        "-i".to_string(),
        source.display().to_string(),
        "-t".to_string(),
        format!("{duration:.3}"),
        "-vf".to_string(),
        scale_filter(),
        "-an".to_string(),
    ]);
    args.extend(x264_args());
    args.push(out.display().to_string());
    args
}

pub fn final_args(background: &Path, audio: &Path, subtitles: &Path, out: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        background.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-vf".to_string(),
        format!(
            "subtitles={}:force_style='{}'",
            escape_filter_path(subtitles),
            SUBTITLE_STYLE
        ),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
    ]);
    args.extend(x264_args());
    args.extend(
        ["-c:a", "aac", "-b:a", "192k", "-shortest", "-movflags", "+faststart"]
            .into_iter()
            .map(str::to_string),
    );
    args.push(out.display().to_string());
    args
}

/// Composes downloaded footage, narration and burned-in captions with ffmpeg.
pub struct FfmpegRenderer {
    client: Client,
    scratch_dir: PathBuf,
    output_dir: PathBuf,
}

impl FfmpegRenderer {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            scratch_dir: cfg.footage_dir(),
            output_dir: cfg.output_dir.clone(),
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .client
            .get(url)
            .timeout(Duration::from_secs(180))
            .send()
            .await
            .with_context(|| format!("Footage download failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Footage download failed: {url}"))?
            .bytes()
            .await
            .context("Footage download read failed")?;
        if bytes.is_empty() {
            anyhow::bail!("Footage download was empty: {url}");
        }
        fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))
    }

    async fn cut_segments(&self, run_dir: &Path, segments: &[FootageSegment]) -> Result<Vec<PathBuf>> {
        let mut sources: HashMap<&str, (PathBuf, f64)> = HashMap::new();
        let mut cuts = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let Some(url) = segment.url.as_deref() else {
                logw(format!("Skipping unresolved footage segment {idx}"));
                continue;
            };
            let duration = segment.interval.duration();
            if duration < MIN_SEGMENT_SECS {
                continue;
            }

            if !sources.contains_key(url) {
                let dest = run_dir.join(format!("source_{}.mp4", sources.len()));
                logi(format!("Downloading footage {}/{}...", idx + 1, segments.len()));
                self.download(url, &dest).await?;
                let length = ffprobe_duration_seconds(&dest).await?;
                sources.insert(url, (dest, length));
            }
            let Some((source, length)) = sources.get(url) else {
                continue;
            };

            let out = run_dir.join(format!("segment_{idx:03}.mp4"));
            run_cmd(&segment_args(source, duration, *length < duration, &out)).await?;
            cuts.push(out);
        }

        Ok(cuts)
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(
        &self,
        audio_path: &Path,
        captions: &[Caption],
        segments: &[FootageSegment],
    ) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().timestamp();
        let run_dir = self.scratch_dir.join(format!("render_{stamp}"));
        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", run_dir.display()))?;
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.output_dir.display()))?;

        let cuts = self.cut_segments(&run_dir, segments).await?;
        if cuts.is_empty() {
            anyhow::bail!("no usable footage segments to render");
        }

        let list = run_dir.join("concat.txt");
        fs::write(&list, concat_list(&cuts))
            .await
            .context("Failed to write concat list")?;
        let background = run_dir.join("background.mp4");
        let mut concat = base_args();
        concat.extend(
            ["-f", "concat", "-safe", "0", "-i"]
                .into_iter()
                .map(str::to_string),
        );
        concat.extend([list.display().to_string(), "-c".to_string(), "copy".to_string()]);
        concat.push(background.display().to_string());
        run_cmd(&concat).await?;

        let subtitles = run_dir.join("captions.srt");
        srt::write_srt(captions, &subtitles).await?;

        let out = self.output_dir.join(format!("rendered_video_{stamp}.mp4"));
        logi("Mixing narration and captions...");
        run_cmd(&final_args(&background, audio_path, &subtitles, &out)).await?;

        if !fs::try_exists(&out).await.unwrap_or(false) {
            anyhow::bail!("ffmpeg finished but {} is missing", out.display());
        }
        logok(format!("Rendered {}", out.display()));
        Ok(out)
    }
}
