use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod captions;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod observer;
pub mod retry;
pub mod run;
pub mod search;
pub mod services;
pub mod session;
pub mod srt;
pub mod stage;
pub mod timeline;

pub use error::GenerationError;
pub use generator::Generator;
pub use observer::{LoggingObserver, NoopObserver, RunObserver};
pub use run::{GenerationRequest, GenerationRun, RunStatus, Voice};
pub use session::Session;
pub use stage::{Artifact, Stage, StageResult, StageStatus};

/// Receives every progress line the pipeline logs, already tagged.
pub type ProgressLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<ProgressLogHook>>> = Lazy::new(|| Mutex::new(None));

pub fn set_log_hook(hook: Option<ProgressLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{message}"),
        _ => tracing::info!(tag, "{message}"),
    }

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
