use crate::config::Config;
use crate::logw;
use crate::run::Voice;
use crate::services::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;

const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";
const USER_AGENT: &str = "topic-shorts";

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn build_ssml(text: &str, voice: Voice) -> String {
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{}'>{}</voice></speak>",
        voice.id(),
        xml_escape(text)
    )
}

/// Primary narration engine: neural voices over the Speech REST API.
pub struct NeuralVoiceTts {
    client: Client,
    api_key: String,
    region: String,
}

impl NeuralVoiceTts {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.azure_speech_key.clone(),
            region: cfg.azure_speech_region.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for NeuralVoiceTts {
    fn name(&self) -> &str {
        "neural-voice"
    }

    fn extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize(&self, text: &str, voice: Voice, out_path: &Path) -> Result<PathBuf> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", USER_AGENT)
            .body(build_ssml(text, voice))
            .send()
            .await
            .context("Speech request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let snippet = raw.chars().take(300).collect::<String>();
            logw(format!("Speech synthesis HTTP {} ({voice})", status.as_u16()));
            anyhow::bail!("speech synthesis HTTP {}: {}", status.as_u16(), snippet);
        }

        let bytes = resp.bytes().await.context("Speech response read failed")?;
        if bytes.is_empty() {
            anyhow::bail!("speech synthesis returned no audio");
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
