pub mod azure_tts;
pub mod elevenlabs;
pub mod openai;
pub mod pexels;

use crate::config::Config;
use crate::ffmpeg::FfmpegRenderer;
use crate::services::Services;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;

/// Wires the HTTP-backed collaborators around one shared client.
pub fn build_services(cfg: &Config) -> Result<Services> {
    let client = Client::builder()
        .gzip(true)
        .build()
        .context("Failed to build HTTP client")?;
    let chat = openai::ChatClient::from_config(client.clone(), cfg);

    Ok(Services {
        script_writer: Arc::new(openai::OpenAiScriptWriter::new(chat.clone())),
        primary_voice: Arc::new(azure_tts::NeuralVoiceTts::new(client.clone(), cfg)),
        fallback_voice: Arc::new(elevenlabs::ElevenLabsTts::new(client.clone(), cfg)),
        aligner: Arc::new(openai::WhisperAligner::new(client.clone(), cfg)),
        planner: Arc::new(openai::OpenAiQueryPlanner::new(chat)),
        footage: Arc::new(pexels::PexelsFinder::new(client.clone(), cfg)),
        renderer: Arc::new(FfmpegRenderer::new(client, cfg)),
    })
}
