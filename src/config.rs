use crate::run::{MAX_RETRIES, MAX_TIMEOUT_SECS, MIN_RETRIES, MIN_TIMEOUT_SECS, Voice};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "open_api_key", default)]
    pub openai_key: String,
    #[serde(rename = "groq_api_key", default)]
    pub groq_key: Option<String>,
    #[serde(default)]
    pub azure_speech_key: String,
    #[serde(default = "default_region")]
    pub azure_speech_region: String,
    #[serde(rename = "elevenlabs_api_key", default)]
    pub elevenlabs_key: String,
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(rename = "pexels_api_key", default)]
    pub pexels_key: String,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_region() -> String {
    "eastus".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_key: String::new(),
            groq_key: None,
            azure_speech_key: String::new(),
            azure_speech_region: default_region(),
            elevenlabs_key: String::new(),
            eleven_voice_id: default_voice_id(),
            eleven_model_id: default_model_id(),
            pexels_key: String::new(),
            voice: Voice::default(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists and overlays the process environment.
    /// Callers apply their own overrides and then call [`Config::validate`].
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok()).await
    }

    pub async fn load_with<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut config = if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using environment only");
            Config::default()
        };

        config.apply_env(lookup);
        Ok(config)
    }

    /// Run settings given on the command line replace file values.
    pub fn apply_overrides(&mut self, voice: Option<Voice>, max_retries: Option<u32>, timeout_secs: Option<u64>) {
        if let Some(voice) = voice {
            self.voice = voice;
        }
        if let Some(retries) = max_retries {
            self.max_retries = retries;
        }
        if let Some(secs) = timeout_secs {
            self.timeout_secs = secs;
        }
    }

    /// Non-empty environment values win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("OPENAI_KEY") {
            self.openai_key = v;
        }
        if let Some(v) = get("GROQ_API_KEY") {
            self.groq_key = Some(v);
        }
        if let Some(v) = get("AZURE_SPEECH_KEY") {
            self.azure_speech_key = v;
        }
        if let Some(v) = get("AZURE_SPEECH_REGION") {
            self.azure_speech_region = v;
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.elevenlabs_key = v;
        }
        if let Some(v) = get("PEXELS_KEY") {
            self.pexels_key = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_key.is_empty() {
            anyhow::bail!("config: open_api_key missing (or set OPENAI_KEY)");
        }
        if self.azure_speech_key.is_empty() {
            anyhow::bail!("config: azure_speech_key missing (or set AZURE_SPEECH_KEY)");
        }
        if self.pexels_key.is_empty() {
            anyhow::bail!("config: pexels_api_key missing (or set PEXELS_KEY)");
        }
        if !(MIN_RETRIES..=MAX_RETRIES).contains(&self.max_retries) {
            anyhow::bail!(
                "config: max_retries must be between {MIN_RETRIES} and {MAX_RETRIES}, got {}",
                self.max_retries
            );
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            anyhow::bail!(
                "config: timeout_secs must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            );
        }
        Ok(())
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.work_dir.join("audio")
    }

    pub fn footage_dir(&self) -> PathBuf {
        self.work_dir.join("footage")
    }
}
