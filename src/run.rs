use crate::error::GenerationError;
use crate::stage::{Artifact, Stage, StageResult, StageStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_RETRIES: u32 = 1;
pub const MAX_RETRIES: u32 = 5;
pub const MIN_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Voice {
    #[default]
    #[serde(rename = "en-US-AriaNeural")]
    Aria,
    #[serde(rename = "en-US-JennyNeural")]
    Jenny,
    #[serde(rename = "en-US-GuyNeural")]
    Guy,
    #[serde(rename = "en-US-DavisNeural")]
    Davis,
    #[serde(rename = "en-US-AmberNeural")]
    Amber,
}

impl Voice {
    pub const ALL: [Voice; 5] = [Voice::Aria, Voice::Jenny, Voice::Guy, Voice::Davis, Voice::Amber];

    /// Neural voice identifier understood by the speech service.
    pub fn id(&self) -> &'static str {
        match self {
            Voice::Aria => "en-US-AriaNeural",
            Voice::Jenny => "en-US-JennyNeural",
            Voice::Guy => "en-US-GuyNeural",
            Voice::Davis => "en-US-DavisNeural",
            Voice::Amber => "en-US-AmberNeural",
        }
    }

    fn short_name(&self) -> &'static str {
        match self {
            Voice::Aria => "aria",
            Voice::Jenny => "jenny",
            Voice::Guy => "guy",
            Voice::Davis => "davis",
            Voice::Amber => "amber",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Voice::ALL
            .into_iter()
            .find(|v| v.id().eq_ignore_ascii_case(wanted) || v.short_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Voice::ALL.iter().map(Voice::id).collect();
                format!("unknown voice '{wanted}' (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topic: String,
    pub voice: Voice,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(
        topic: impl Into<String>,
        voice: Voice,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(GenerationError::InvalidRequest("topic is empty".into()));
        }
        if !(MIN_RETRIES..=MAX_RETRIES).contains(&max_retries) {
            return Err(GenerationError::InvalidRequest(format!(
                "max retries must be between {MIN_RETRIES} and {MAX_RETRIES}, got {max_retries}"
            )));
        }
        let secs = timeout.as_secs();
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
            return Err(GenerationError::InvalidRequest(format!(
                "timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds, got {secs}"
            )));
        }
        Ok(Self {
            topic,
            voice,
            max_retries,
            timeout,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Ready,
    Generating,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Ready => "ready",
            RunStatus::Generating => "generating",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One end-to-end execution for a single request.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    topic: String,
    status: RunStatus,
    stages: Vec<StageResult>,
    failure: Option<GenerationError>,
}

impl GenerationRun {
    pub fn new(request: &GenerationRequest) -> Self {
        Self {
            topic: request.topic.clone(),
            status: RunStatus::Ready,
            stages: Stage::ALL.iter().copied().map(StageResult::pending).collect(),
            failure: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    pub fn stage(&self, stage: Stage) -> &StageResult {
        &self.stages[stage.index()]
    }

    pub fn failure(&self) -> Option<&GenerationError> {
        self.failure.as_ref()
    }

    pub fn script(&self) -> Option<&str> {
        match &self.stage(Stage::Script).artifact {
            Some(Artifact::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn audio_path(&self) -> Option<&Path> {
        match &self.stage(Stage::Audio).artifact {
            Some(Artifact::File(path)) => Some(path),
            _ => None,
        }
    }

    pub fn final_video(&self) -> Option<&Path> {
        match &self.stage(Stage::Render).artifact {
            Some(Artifact::File(path)) => Some(path),
            _ => None,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.status = RunStatus::Generating;
    }

    pub(crate) fn record(
        &mut self,
        stage: Stage,
        status: StageStatus,
        message: impl Into<String>,
        artifact: Option<Artifact>,
    ) {
        let slot = &mut self.stages[stage.index()];
        slot.status = status;
        slot.message = message.into();
        slot.artifact = artifact;
    }

    pub(crate) fn complete(&mut self) {
        self.status = RunStatus::Completed;
    }

    pub(crate) fn fail(&mut self, err: GenerationError) {
        self.status = RunStatus::Failed;
        self.failure = Some(err);
    }
}
