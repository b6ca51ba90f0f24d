#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use topic_shorts::run::Voice;
use topic_shorts::services::{
    CaptionAligner, FootageFinder, QueryPlanner, Renderer, ScriptWriter, Services, SpeechSynthesizer,
};
use topic_shorts::timeline::{Caption, FootageSegment, Interval, TimedQuery};
use topic_shorts::{GenerationRequest, RunObserver, Stage, StageStatus};

pub fn request(max_retries: u32) -> GenerationRequest {
    GenerationRequest::new("weird ocean facts", Voice::Jenny, max_retries, Duration::from_secs(30)).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail,
    Hang,
}

pub struct FakeScript {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ScriptWriter for FakeScript {
    async fn write_script(&self, topic: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("model unavailable"));
        }
        Ok(format!("Facts about {topic}. Octopuses have three hearts."))
    }
}

/// Speech provider that replays scripted outcomes and records when it was called.
pub struct FakeVoice {
    name: &'static str,
    extension: &'static str,
    outcomes: Mutex<VecDeque<Outcome>>,
    otherwise: Outcome,
    pub calls: Mutex<Vec<(Instant, Voice, PathBuf)>>,
}

impl FakeVoice {
    pub fn new(name: &'static str, extension: &'static str, outcomes: &[Outcome], otherwise: Outcome) -> Self {
        Self {
            name,
            extension,
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            otherwise,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _, _)| *at).collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeVoice {
    fn name(&self) -> &str {
        self.name
    }

    fn extension(&self) -> &'static str {
        self.extension
    }

    async fn synthesize(&self, _text: &str, voice: Voice, out_path: &Path) -> Result<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), voice, out_path.to_path_buf()));
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(self.otherwise);
        match outcome {
            Outcome::Succeed => Ok(out_path.to_path_buf()),
            Outcome::Fail => Err(anyhow!("{} rejected the request", self.name)),
            Outcome::Hang => std::future::pending::<Result<PathBuf>>().await,
        }
    }
}

pub struct FakeAligner {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CaptionAligner for FakeAligner {
    async fn align(&self, _audio_path: &Path) -> Result<Vec<Caption>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("transcription HTTP 500"));
        }
        Ok(vec![
            Caption {
                interval: Interval::new(0.0, 2.0),
                text: "Octopuses have".into(),
            },
            Caption {
                interval: Interval::new(2.0, 4.0),
                text: "three hearts".into(),
            },
        ])
    }
}

pub struct FakePlanner {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl QueryPlanner for FakePlanner {
    async fn plan(&self, _script: &str, captions: &[Caption]) -> Result<Vec<TimedQuery>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("chat completion HTTP 429"));
        }
        Ok(captions
            .iter()
            .map(|c| TimedQuery {
                interval: c.interval,
                keywords: vec![c.text.clone()],
            })
            .collect())
    }
}

pub struct FakeFinder {
    pub resolve: bool,
    /// Query positions left unmatched even when `resolve` is set.
    pub skip: Vec<usize>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FootageFinder for FakeFinder {
    async fn find(&self, queries: &[TimedQuery]) -> Result<Vec<FootageSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(queries
            .iter()
            .enumerate()
            .map(|(idx, q)| FootageSegment {
                interval: q.interval,
                url: (self.resolve && !self.skip.contains(&idx))
                    .then(|| format!("https://footage.test/{idx}.mp4")),
            })
            .collect())
    }
}

pub struct FakeRenderer {
    pub fail: bool,
    pub calls: AtomicUsize,
    /// When set, rendering waits here until notified.
    pub gate: Option<Arc<Notify>>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, _audio: &Path, _captions: &[Caption], _footage: &[FootageSegment]) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(anyhow!("ffmpeg failed (exit status: 1)"));
        }
        Ok(PathBuf::from("output/rendered_video_test.mp4"))
    }
}

pub struct Fakes {
    pub script: Arc<FakeScript>,
    pub primary: Arc<FakeVoice>,
    pub fallback: Arc<FakeVoice>,
    pub aligner: Arc<FakeAligner>,
    pub planner: Arc<FakePlanner>,
    pub finder: Arc<FakeFinder>,
    pub renderer: Arc<FakeRenderer>,
}

impl Fakes {
    pub fn happy() -> Self {
        Self::with_voices(&[], Outcome::Succeed, &[], Outcome::Succeed)
    }

    pub fn with_voices(primary: &[Outcome], primary_else: Outcome, fallback: &[Outcome], fallback_else: Outcome) -> Self {
        Self {
            script: Arc::new(FakeScript {
                fail: false,
                calls: AtomicUsize::new(0),
            }),
            primary: Arc::new(FakeVoice::new("primary", "wav", primary, primary_else)),
            fallback: Arc::new(FakeVoice::new("fallback", "mp3", fallback, fallback_else)),
            aligner: Arc::new(FakeAligner {
                fail: false,
                calls: AtomicUsize::new(0),
            }),
            planner: Arc::new(FakePlanner {
                fail: false,
                calls: AtomicUsize::new(0),
            }),
            finder: Arc::new(FakeFinder {
                resolve: true,
                skip: Vec::new(),
                calls: AtomicUsize::new(0),
            }),
            renderer: Arc::new(FakeRenderer {
                fail: false,
                calls: AtomicUsize::new(0),
                gate: None,
            }),
        }
    }

    /// How many times the collaborator behind `stage` was invoked.
    pub fn calls_for(&self, stage: Stage) -> usize {
        match stage {
            Stage::Script => self.script.calls.load(Ordering::SeqCst),
            Stage::Audio => self.primary.call_count() + self.fallback.call_count(),
            Stage::Captions => self.aligner.calls.load(Ordering::SeqCst),
            Stage::Search => self.planner.calls.load(Ordering::SeqCst),
            Stage::Video => self.finder.calls.load(Ordering::SeqCst),
            Stage::Render => self.renderer.calls.load(Ordering::SeqCst),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            script_writer: self.script.clone(),
            primary_voice: self.primary.clone(),
            fallback_voice: self.fallback.clone(),
            aligner: self.aligner.clone(),
            planner: self.planner.clone(),
            footage: self.finder.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

/// Observer that keeps every transition in order.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<(Stage, StageStatus, String)>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<(Stage, StageStatus, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses_for(&self, stage: Stage) -> Vec<StageStatus> {
        self.events()
            .into_iter()
            .filter(|(s, _, _)| *s == stage)
            .map(|(_, status, _)| status)
            .collect()
    }
}

impl RunObserver for Recorder {
    fn on_stage_transition(&self, stage: Stage, status: StageStatus, message: &str) {
        self.events.lock().unwrap().push((stage, status, message.to_string()));
    }
}
