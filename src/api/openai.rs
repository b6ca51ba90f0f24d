use crate::captions::{self, TimedWord, MAX_CAPTION_CHARS};
use crate::config::Config;
use crate::search;
use crate::services::{CaptionAligner, QueryPlanner, ScriptWriter};
use crate::timeline::{self, Caption, TimedQuery};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const GROQ_BASE: &str = "https://api.groq.com/openai/v1";
const OPENAI_CHAT_MODEL: &str = "gpt-4o";
const GROQ_CHAT_MODEL: &str = "llama3-70b-8192";
const WHISPER_MODEL: &str = "whisper-1";
const CHAT_TIMEOUT_SECS: u64 = 120;
const TRANSCRIBE_TIMEOUT_SECS: u64 = 300;

const SCRIPT_PROMPT: &str = r#"You are a seasoned content writer for a YouTube Shorts channel, specializing in facts videos.

Your facts shorts are concise, each lasting less than 50 seconds (approximately 140 words). They are engaging and original. When a user requests a specific type of facts short, you create it.

For instance, if the user asks for "Weird facts" you would produce content like this:

Weird facts you don't know:
- Bananas are berries, but strawberries aren't.
- A single cloud can weigh over a million pounds.
- Octopuses have three hearts and blue blood.

Keep it brief, highly interesting, and unique.

Output ONLY a valid JSON object with the key 'script' and no other text, for example:
{"script": "Your script content here"}"#;

const QUERY_PROMPT: &str = r#"Given a video script and its timed captions, extract three visually concrete keywords for each time segment that can be used to search for background videos. Keywords should be short, capture the essence of the sentence, and may be synonyms or related terms. If a caption is vague, use the next caption for context. Prefer two-word keywords over single words. Split a segment that carries two or more important ideas into shorter segments. Segments must be strictly consecutive, cover the whole video, and each last 2-4 seconds.

Every keyword must be in English and depict something visual: 'crying child' is good, 'emotional moment' is not.

Return ONLY a JSON array shaped like [[[t1, t2], ["keyword1", "keyword2", "keyword3"]], [[t2, t3], ["keyword4", "keyword5", "keyword6"]], ...] with no other text."#;

#[derive(Debug, Deserialize)]
struct TranscriptWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    end: f64,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    words: Vec<TranscriptWord>,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

fn log_api_error(provider: &str, root: &Value) -> bool {
    let Some(err) = root.get("error") else {
        return false;
    };
    if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
        logw(format!("{provider} error message: {msg}"));
    }
    if let Some(typ) = err.get("type").and_then(|v| v.as_str()) {
        logw(format!("{provider} error type: {typ}"));
    }
    if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
        logw(format!("{provider} error code: {code}"));
    }
    true
}

fn chat_extract_content(resp_json: &str) -> Option<String> {
    let root: Value = serde_json::from_str(resp_json).ok()?;
    if log_api_error("Chat", &root) {
        return None;
    }
    root.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.trim().to_string())
}

fn script_value_regex() -> Option<&'static Regex> {
    static SCRIPT_RE: OnceCell<Regex> = OnceCell::new();
    SCRIPT_RE
        .get_or_try_init(|| Regex::new(r#"(?s)"script"\s*:\s*"((?:[^"\\]|\\.)*)""#))
        .ok()
}

fn script_from_json(candidate: &str) -> Option<String> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => match map.get("script") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => map.values().find_map(|v| v.as_str().map(str::to_string)),
        },
        _ => None,
    }
}

/// Decodes a JSON string body; raw newlines inside it are kept as-is.
fn unescape_json_string(body: &str) -> String {
    let quoted = format!("\"{}\"", body.replace('\n', "\\n").replace('\r', "\\r"));
    serde_json::from_str::<String>(&quoted).unwrap_or_else(|_| body.replace("\\\"", "\""))
}

/// Pulls the narration out of a reply that should have been `{"script": ...}`.
pub fn extract_script(content: &str) -> String {
    let unfenced = search::strip_code_fences(content);
    let embedded = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => unfenced[start..=end].to_string(),
        _ => unfenced.clone(),
    };
    let flattened = content.trim().replace(['\n', '\r'], " ");

    for candidate in [content.trim(), unfenced.as_str(), embedded.as_str(), flattened.as_str()] {
        if let Some(script) = script_from_json(candidate) {
            return script;
        }
    }

    if let Some(caps) = script_value_regex().and_then(|re| re.captures(content)) {
        return unescape_json_string(&caps[1]);
    }

    logw("Script reply was not JSON; using cleaned raw text.");
    unfenced.trim_matches('`').trim().to_string()
}

/// Chat-completions client for OpenAI or the OpenAI-compatible Groq endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn from_config(client: Client, cfg: &Config) -> Self {
        match cfg.groq_key.as_deref().filter(|k| k.len() > 30) {
            Some(key) => Self {
                client,
                base_url: GROQ_BASE.to_string(),
                api_key: key.to_string(),
                model: GROQ_CHAT_MODEL.to_string(),
            },
            None => Self {
                client,
                base_url: OPENAI_BASE.to_string(),
                api_key: cfg.openai_key.clone(),
                model: OPENAI_CHAT_MODEL.to_string(),
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if let Some(max) = max_tokens {
            body["max_tokens"] = json!(max);
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .send()
            .await
            .context("Chat request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet = raw.chars().take(800).collect::<String>();
            if let Ok(root) = serde_json::from_str::<Value>(&raw) {
                log_api_error("Chat", &root);
            }
            anyhow::bail!("chat completion HTTP {}: {}", status.as_u16(), snippet);
        }

        chat_extract_content(&raw).context("chat completion response had no message content")
    }
}

pub struct OpenAiScriptWriter {
    chat: ChatClient,
}

impl OpenAiScriptWriter {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl ScriptWriter for OpenAiScriptWriter {
    async fn write_script(&self, topic: &str) -> Result<String> {
        logi(format!("Requesting script from {}...", self.chat.model()));
        let content = self.chat.complete(SCRIPT_PROMPT, topic, 0.7, Some(500)).await?;
        let script = extract_script(&content);
        if script.trim().is_empty() {
            anyhow::bail!("model returned an empty script");
        }
        logok(format!("Script received ({} words)", script.split_whitespace().count()));
        Ok(script)
    }
}

pub struct OpenAiQueryPlanner {
    chat: ChatClient,
}

impl OpenAiQueryPlanner {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl QueryPlanner for OpenAiQueryPlanner {
    async fn plan(&self, script: &str, captions: &[Caption]) -> Result<Vec<TimedQuery>> {
        let Some(end) = timeline::end_of(captions) else {
            logw("No captions available; using fallback search terms.");
            return Ok(search::fallback_queries(script, captions));
        };

        let user = format!(
            "Script: {}\nTimed Captions:{}\n",
            script,
            search::describe_captions(captions)
        );
        let raw = self.chat.complete(QUERY_PROMPT, &user, 0.3, None).await?;
        let snippet = raw.chars().take(200).collect::<String>();
        logi(format!("Search query reply (first 200 chars): {snippet}"));

        match search::parse_timed_queries(&raw, end) {
            Some(queries) => {
                logok(format!("Generated {} search term segments", queries.len()));
                Ok(queries)
            }
            None => {
                logw("Could not use the search query reply; using fallback search terms.");
                Ok(search::fallback_queries(script, captions))
            }
        }
    }
}

/// Word-timestamped transcription through the Whisper endpoint.
pub struct WhisperAligner {
    client: Client,
    api_key: String,
}

impl WhisperAligner {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.openai_key.clone(),
        }
    }
}

pub fn captions_from_transcript(transcript_json: &str) -> Result<Vec<Caption>> {
    let transcript: Transcript =
        serde_json::from_str(transcript_json).context("Failed to parse transcription JSON")?;

    if transcript.text.trim().is_empty() && transcript.words.is_empty() {
        return Ok(Vec::new());
    }

    if transcript.words.is_empty() {
        let total = transcript
            .duration
            .or_else(|| transcript.segments.last().map(|s| s.end));
        return captions::estimate_captions(&transcript.text, total, MAX_CAPTION_CHARS);
    }

    let words: Vec<TimedWord> = transcript
        .words
        .into_iter()
        .filter(|w| !w.word.trim().is_empty())
        .map(|w| TimedWord {
            word: w.word,
            start: w.start,
            end: w.end,
        })
        .collect();
    captions::captions_from_words(&words, MAX_CAPTION_CHARS)
}

#[async_trait]
impl CaptionAligner for WhisperAligner {
    async fn align(&self, audio_path: &Path) -> Result<Vec<Caption>> {
        let meta = fs::metadata(audio_path)
            .await
            .with_context(|| format!("Audio file not found: {}", audio_path.display()))?;
        if meta.len() == 0 {
            anyhow::bail!("Audio file is empty (0 bytes): {}", audio_path.display());
        }

        let bytes = fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio {}", audio_path.display()))?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let form = reqwest::multipart::Form::new()
            .text("model", WHISPER_MODEL)
            .text("language", "en")
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment")
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        logi(format!("Transcribing {} ({} bytes)...", audio_path.display(), meta.len()));
        let resp = self
            .client
            .post(format!("{OPENAI_BASE}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
            .send()
            .await
            .context("Transcription request failed")?;

        let status = resp.status();
        let raw = resp.text().await.context("Transcription response read failed")?;
        if !status.is_success() {
            let snippet = raw.chars().take(800).collect::<String>();
            anyhow::bail!("transcription HTTP {}: {}", status.as_u16(), snippet);
        }

        let captions = captions_from_transcript(&raw)?;
        logok(format!("Timed captions generated: {}", captions.len()));
        Ok(captions)
    }
}
