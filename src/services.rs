//! Seams between the orchestrator and the outside services it drives.

use crate::run::Voice;
use crate::timeline::{Caption, FootageSegment, TimedQuery};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, topic: &str) -> Result<String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// File extension of the audio this provider writes.
    fn extension(&self) -> &'static str;

    /// Writes narration for `text` to `out_path` and returns the written path.
    async fn synthesize(&self, text: &str, voice: Voice, out_path: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait CaptionAligner: Send + Sync {
    async fn align(&self, audio_path: &Path) -> Result<Vec<Caption>>;
}

#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, script: &str, captions: &[Caption]) -> Result<Vec<TimedQuery>>;
}

#[async_trait]
pub trait FootageFinder: Send + Sync {
    async fn find(&self, queries: &[TimedQuery]) -> Result<Vec<FootageSegment>>;
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        audio_path: &Path,
        captions: &[Caption],
        footage: &[FootageSegment],
    ) -> Result<PathBuf>;
}

#[derive(Clone)]
pub struct Services {
    pub script_writer: Arc<dyn ScriptWriter>,
    pub primary_voice: Arc<dyn SpeechSynthesizer>,
    pub fallback_voice: Arc<dyn SpeechSynthesizer>,
    pub aligner: Arc<dyn CaptionAligner>,
    pub planner: Arc<dyn QueryPlanner>,
    pub footage: Arc<dyn FootageFinder>,
    pub renderer: Arc<dyn Renderer>,
}
