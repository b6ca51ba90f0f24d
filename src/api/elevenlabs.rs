use crate::config::Config;
use crate::logw;
use crate::run::Voice;
use crate::services::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Fallback narration engine. It speaks with its own configured voice, so
/// the requested neural voice is not forwarded.
pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsTts {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    fn name(&self) -> &str {
        "ElevenLabs"
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, _voice: Voice, out_path: &Path) -> Result<PathBuf> {
        if self.api_key.is_empty() {
            anyhow::bail!("elevenlabs_api_key is not configured");
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
            self.voice_id
        );

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("ElevenLabs request failed")?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            logw(format!("ElevenLabs TTS failed HTTP {code}"));
            anyhow::bail!("ElevenLabs TTS failed HTTP {code}");
        }

        let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
        if bytes.is_empty() {
            anyhow::bail!("ElevenLabs returned no audio");
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        Ok(out_path.to_path_buf())
    }
}
