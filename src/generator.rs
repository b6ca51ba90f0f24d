use crate::error::GenerationError;
use crate::observer::RunObserver;
use crate::retry::{AudioRetryPolicy, DEFAULT_BACKOFF_STEP};
use crate::run::{GenerationRequest, GenerationRun, RunStatus, Voice};
use crate::services::{Services, SpeechSynthesizer};
use crate::stage::{Artifact, Stage, StageStatus};
use crate::timeline::{self, FootageSegment};
use crate::{logi, logok, logw};
use anyhow::anyhow;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Drives the six stages strictly in order for one request.
pub struct Generator {
    services: Services,
    audio_dir: PathBuf,
    backoff_step: Duration,
}

fn fatal(stage: Stage) -> impl FnOnce(anyhow::Error) -> GenerationError {
    move |err| GenerationError::stage(stage, err)
}

async fn synthesize_within(
    synth: &dyn SpeechSynthesizer,
    text: &str,
    voice: Voice,
    out_path: &Path,
    limit: Duration,
) -> anyhow::Result<PathBuf> {
    match tokio::time::timeout(limit, synth.synthesize(text, voice, out_path)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{} timed out after {} seconds",
            synth.name(),
            limit.as_secs()
        )),
    }
}

impl Generator {
    pub fn new(services: Services, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            services,
            audio_dir: audio_dir.into(),
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub async fn run(&self, request: &GenerationRequest, observer: &dyn RunObserver) -> GenerationRun {
        let mut run = GenerationRun::new(request);
        self.run_into(request, &mut run, observer).await;
        run
    }

    /// Executes `request` into a freshly created `run`, publishing every
    /// transition to `observer` before moving on.
    pub async fn run_into(
        &self,
        request: &GenerationRequest,
        run: &mut GenerationRun,
        observer: &dyn RunObserver,
    ) {
        run.begin();
        observer.on_run_status(RunStatus::Generating);
        for result in run.stages() {
            observer.on_stage_transition(result.stage, result.status, &result.message);
        }

        logi(format!("Topic: {}", request.topic));
        match self.execute(request, run, observer).await {
            Ok(video) => {
                logok(format!("Final video: {}", video.display()));
                run.complete();
                observer.on_run_status(RunStatus::Completed);
            }
            Err(err) => {
                logw(format!("Generation failed: {err}"));
                run.fail(err);
                observer.on_run_status(RunStatus::Failed);
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        run: &mut GenerationRun,
        observer: &dyn RunObserver,
    ) -> Result<PathBuf, GenerationError> {
        let services = &self.services;

        let script = self
            .step(
                run,
                observer,
                Stage::Script,
                async {
                    services
                        .script_writer
                        .write_script(&request.topic)
                        .await
                        .map_err(fatal(Stage::Script))
                },
                |script: &String| Artifact::Text(script.clone()),
            )
            .await?;

        let audio_path = self
            .step(
                run,
                observer,
                Stage::Audio,
                self.narrate(request, &script),
                |path: &PathBuf| Artifact::File(path.clone()),
            )
            .await?;

        let captions = self
            .step(
                run,
                observer,
                Stage::Captions,
                async {
                    services
                        .aligner
                        .align(&audio_path)
                        .await
                        .map_err(fatal(Stage::Captions))
                },
                |captions: &Vec<_>| Artifact::Captions(captions.clone()),
            )
            .await?;

        let queries = self
            .step(
                run,
                observer,
                Stage::Search,
                async {
                    services
                        .planner
                        .plan(&script, &captions)
                        .await
                        .map_err(fatal(Stage::Search))
                },
                |queries: &Vec<_>| Artifact::Queries(queries.clone()),
            )
            .await?;

        let footage = self
            .step(
                run,
                observer,
                Stage::Video,
                async {
                    let found = services
                        .footage
                        .find(&queries)
                        .await
                        .map_err(fatal(Stage::Video))?;
                    let filled = timeline::fill_gaps(found);
                    if filled.is_empty() || !filled.iter().all(FootageSegment::is_resolved) {
                        return Err(GenerationError::StageFailed {
                            stage: Stage::Video,
                            message: "no background footage matched".to_string(),
                        });
                    }
                    Ok(filled)
                },
                |footage: &Vec<_>| Artifact::Footage(footage.clone()),
            )
            .await?;

        self.step(
            run,
            observer,
            Stage::Render,
            async {
                let video = services
                    .renderer
                    .render(&audio_path, &captions, &footage)
                    .await
                    .map_err(fatal(Stage::Render))?;
                if video.as_os_str().is_empty() {
                    return Err(GenerationError::StageFailed {
                        stage: Stage::Render,
                        message: "renderer returned an empty output path".to_string(),
                    });
                }
                Ok(video)
            },
            |video: &PathBuf| Artifact::File(video.clone()),
        )
        .await
    }

    async fn step<T, F, A>(
        &self,
        run: &mut GenerationRun,
        observer: &dyn RunObserver,
        stage: Stage,
        work: F,
        artifact: A,
    ) -> Result<T, GenerationError>
    where
        F: Future<Output = Result<T, GenerationError>>,
        A: FnOnce(&T) -> Artifact,
    {
        let processing = stage.processing_message();
        run.record(stage, StageStatus::Processing, processing, None);
        observer.on_stage_transition(stage, StageStatus::Processing, processing);

        match work.await {
            Ok(value) => {
                let done = stage.success_message();
                run.record(stage, StageStatus::Success, done, Some(artifact(&value)));
                observer.on_stage_transition(stage, StageStatus::Success, done);
                Ok(value)
            }
            Err(err) => {
                let message = err.message();
                run.record(stage, StageStatus::Error, message.clone(), None);
                observer.on_stage_transition(stage, StageStatus::Error, &message);
                Err(err)
            }
        }
    }

    /// Primary provider with bounded retries, then one fallback attempt.
    async fn narrate(&self, request: &GenerationRequest, script: &str) -> Result<PathBuf, GenerationError> {
        let policy = AudioRetryPolicy::for_request(request, self.backoff_step);
        let stem = self
            .audio_dir
            .join(format!("audio_tts_{}", chrono::Utc::now().timestamp()));

        let primary = self.services.primary_voice.as_ref();
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=policy.max_attempts {
            logi(format!(
                "Audio generation attempt {attempt}/{} ({})",
                policy.max_attempts,
                primary.name()
            ));
            let out_path = stem.with_extension(primary.extension());
            match synthesize_within(primary, script, request.voice, &out_path, policy.attempt_timeout).await {
                Ok(path) => {
                    logok(format!("Audio generated: {}", path.display()));
                    return Ok(path);
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    logw(format!("Audio attempt {attempt} failed: {last_error}"));
                }
            }

            if let Some(delay) = policy.delay_after(attempt) {
                logi(format!("Waiting {} seconds before retry...", delay.as_secs()));
                tokio::time::sleep(delay).await;
            }
        }

        let fallback = self.services.fallback_voice.as_ref();
        logi(format!("Trying fallback audio generation ({})...", fallback.name()));
        let out_path = stem.with_extension(fallback.extension());
        match synthesize_within(fallback, script, request.voice, &out_path, policy.attempt_timeout).await {
            Ok(path) => {
                logok(format!("Fallback audio generated: {}", path.display()));
                Ok(path)
            }
            Err(err) => {
                logw(format!("Fallback audio failed: {err:#}"));
                Err(GenerationError::AudioExhausted {
                    attempts: policy.max_attempts,
                    message: format!(
                        "{}: {last_error}; {}: {err:#}",
                        primary.name(),
                        fallback.name()
                    ),
                })
            }
        }
    }
}
