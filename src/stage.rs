use crate::timeline::{Caption, FootageSegment, TimedQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One step of the fixed generation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Audio,
    Captions,
    Search,
    Video,
    Render,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Script,
        Stage::Audio,
        Stage::Captions,
        Stage::Search,
        Stage::Video,
        Stage::Render,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Audio => "audio",
            Stage::Captions => "captions",
            Stage::Search => "search",
            Stage::Video => "video",
            Stage::Render => "render",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Stage::Script => 0,
            Stage::Audio => 1,
            Stage::Captions => 2,
            Stage::Search => 3,
            Stage::Video => 4,
            Stage::Render => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Script => "Script",
            Stage::Audio => "Audio",
            Stage::Captions => "Captions",
            Stage::Search => "Search",
            Stage::Video => "Video",
            Stage::Render => "Render",
        }
    }

    pub(crate) fn processing_message(&self) -> &'static str {
        match self {
            Stage::Script => "Generating script...",
            Stage::Audio => "Generating audio...",
            Stage::Captions => "Generating timed captions...",
            Stage::Search => "Generating video search queries...",
            Stage::Video => "Finding background videos...",
            Stage::Render => "Rendering final video...",
        }
    }

    pub(crate) fn success_message(&self) -> &'static str {
        match self {
            Stage::Script => "Script generated successfully!",
            Stage::Audio => "Audio generated successfully!",
            Stage::Captions => "Captions generated successfully!",
            Stage::Search => "Search terms generated!",
            Stage::Video => "Background videos found!",
            Stage::Render => "Video rendered successfully!",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Error,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Error)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Processing => "processing",
            StageStatus::Success => "success",
            StageStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// What a successful stage hands to the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    Text(String),
    File(PathBuf),
    Captions(Vec<Caption>),
    Queries(Vec<TimedQuery>),
    Footage(Vec<FootageSegment>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub message: String,
    pub artifact: Option<Artifact>,
}

impl StageResult {
    pub fn pending(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            message: "Waiting...".to_string(),
            artifact: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_listed_in_pipeline_order() {
        for (idx, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), idx);
        }
        assert_eq!(Stage::ALL.first(), Some(&Stage::Script));
        assert_eq!(Stage::ALL.last(), Some(&Stage::Render));
    }

    #[test]
    fn status_display_and_terminality() {
        assert_eq!(StageStatus::Processing.to_string(), "processing");
        assert_eq!(Stage::Captions.to_string(), "captions");
        assert!(StageStatus::Error.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
    }

    #[test]
    fn artifact_serializes_with_kind_tag() {
        let json = serde_json::to_value(Artifact::Text("hi".into())).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["value"], "hi");
    }
}
