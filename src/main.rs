use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use topic_shorts::api::build_services;
use topic_shorts::config::Config;
use topic_shorts::{
    GenerationRequest, Generator, RunStatus, Session, Stage, StageStatus, Voice, init,
    set_log_hook,
};

const LOG_MAX_LINES: usize = 300;

/// Turn a topic into a narrated, captioned short video.
#[derive(Parser, Debug)]
#[command(name = "topic-shorts", version)]
struct Cli {
    /// What the video should be about, e.g. "Weird facts about octopuses".
    topic: String,

    /// Narration voice (aria, jenny, guy, davis, amber or a full en-US-*Neural id).
    #[arg(long)]
    voice: Option<Voice>,

    /// Primary speech attempts before falling back (1-5).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-attempt speech timeout in seconds (30-120).
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn status_icon(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "⏸",
        StageStatus::Processing => "⏳",
        StageStatus::Success => "✅",
        StageStatus::Error => "❌",
    }
}

fn push_log_line(buffer: &Mutex<Vec<String>>, line: &str) {
    let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
    if guard.len() >= LOG_MAX_LINES {
        let excess = guard.len() + 1 - LOG_MAX_LINES;
        guard.drain(0..excess);
    }
    guard.push(line.to_string());
}

/// `RUST_LOG` if set, otherwise `info`.
fn log_directive<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(EnvFilter::DEFAULT_ENV)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before the filter reads RUST_LOG.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directive(|key| std::env::var(key).ok())))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config).await?;
    cfg.apply_overrides(cli.voice, cli.max_retries, cli.timeout);
    cfg.validate()?;

    init::prepare_workspace(&cfg).await?;
    if !init::check_ffmpeg().await {
        tracing::warn!("FFmpeg not found in PATH. Rendering will fail until it is installed.");
    }

    let request = GenerationRequest::new(
        cli.topic,
        cfg.voice,
        cfg.max_retries,
        Duration::from_secs(cfg.timeout_secs),
    )?;

    let services = build_services(&cfg).context("Failed to set up services")?;
    let session = Session::new(Generator::new(services, cfg.audio_dir()));

    let log_buffer = Arc::new(Mutex::new(Vec::new()));
    let hook_buffer = Arc::clone(&log_buffer);
    set_log_hook(Some(Arc::new(Mutex::new(move |line: &str| {
        push_log_line(&hook_buffer, line);
    }))));

    let observer = |stage: Stage, status: StageStatus, message: &str| {
        if status != StageStatus::Pending {
            println!("{} {}: {}", status_icon(status), stage.title(), message);
        }
    };

    let run = session.generate(&request, &observer).await?;
    set_log_hook(None);

    if run.status() == RunStatus::Completed {
        if let Some(script) = run.script() {
            println!("\nScript:\n{script}\n");
        }
        if let Some(audio) = run.audio_path() {
            println!("Audio: {}", audio.display());
        }
        if let Some(video) = run.final_video() {
            println!("Video: {}", video.display());
        }
        return Ok(());
    }

    if let Some(err) = run.failure() {
        let stage = err.failed_stage().map(|s| s.title()).unwrap_or("setup");
        eprintln!("\nGeneration failed at {stage}: {}", err.message());
    }
    eprintln!("\nLogs:");
    for line in log_buffer.lock().unwrap_or_else(|e| e.into_inner()).iter() {
        eprintln!("{line}");
    }
    std::process::exit(1);
}
