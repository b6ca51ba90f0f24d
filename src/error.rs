use crate::run::RunStatus;
use crate::stage::Stage;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: Stage, message: String },

    #[error("audio generation failed after {attempts} attempt(s) and fallback: {message}")]
    AudioExhausted { attempts: u32, message: String },

    #[error("a generation run is already in progress")]
    AlreadyRunning,

    #[error("run has not finished yet (status: {0})")]
    NotTerminal(RunStatus),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Wraps a collaborator failure; `{:#}` keeps the anyhow context chain.
    pub(crate) fn stage(stage: Stage, err: anyhow::Error) -> Self {
        GenerationError::StageFailed {
            stage,
            message: format!("{err:#}"),
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            GenerationError::StageFailed { stage, .. } => Some(*stage),
            GenerationError::AudioExhausted { .. } => Some(Stage::Audio),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GenerationError::StageFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
