mod common;

use common::{FakeAligner, FakeFinder, FakePlanner, FakeRenderer, FakeScript, Fakes, Outcome, Recorder, request};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use topic_shorts::timeline::Interval;
use topic_shorts::{Artifact, GenerationError, Generator, RunStatus, Stage, StageStatus, Voice};

fn generator(fakes: &Fakes) -> Generator {
    Generator::new(fakes.services(), "workspace/audio")
}

#[tokio::test(start_paused = true)]
async fn all_stages_succeed_in_order() {
    let fakes = Fakes::happy();
    let recorder = Recorder::default();

    let run = generator(&fakes).run(&request(3), &recorder).await;

    assert_eq!(run.status(), RunStatus::Completed);
    assert!(run.failure().is_none());
    assert!(run.stages().iter().all(|s| s.status == StageStatus::Success));
    assert!(run.script().unwrap().contains("weird ocean facts"));
    assert_eq!(run.final_video().unwrap().to_str(), Some("output/rendered_video_test.mp4"));
    assert!(matches!(
        run.stage(Stage::Video).artifact,
        Some(Artifact::Footage(ref f)) if f.len() == 2
    ));

    let events = recorder.events();
    assert_eq!(events.len(), 18);
    for (idx, stage) in Stage::ALL.iter().enumerate() {
        assert_eq!(events[idx].0, *stage);
        assert_eq!(events[idx].1, StageStatus::Pending);
        let processing = &events[6 + idx * 2];
        let success = &events[7 + idx * 2];
        assert_eq!((processing.0, processing.1), (*stage, StageStatus::Processing));
        assert_eq!((success.0, success.1), (*stage, StageStatus::Success));
    }
    assert_eq!(events[6].2, "Generating script...");
    assert_eq!(events[7].2, "Script generated successfully!");
}

#[tokio::test(start_paused = true)]
async fn requested_voice_reaches_primary_provider() {
    let fakes = Fakes::happy();
    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    let calls = fakes.primary.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, Voice::Jenny);
    let path = calls[0].2.to_string_lossy().into_owned();
    assert!(path.starts_with("workspace/audio/audio_tts_"));
    assert!(path.ends_with(".wav"));
    assert_eq!(run.audio_path(), Some(calls[0].2.as_path()));
}

#[tokio::test(start_paused = true)]
async fn script_failure_stops_the_pipeline() {
    let mut fakes = Fakes::happy();
    fakes.script = Arc::new(FakeScript {
        fail: true,
        calls: AtomicUsize::new(0),
    });
    let recorder = Recorder::default();

    let run = generator(&fakes).run(&request(3), &recorder).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.failure().and_then(GenerationError::failed_stage), Some(Stage::Script));
    assert_eq!(run.stage(Stage::Script).status, StageStatus::Error);
    assert!(run.stage(Stage::Script).message.contains("model unavailable"));
    for stage in &Stage::ALL[1..] {
        assert_eq!(run.stage(*stage).status, StageStatus::Pending);
    }
    assert_eq!(fakes.primary.call_count(), 0);
    assert_eq!(fakes.aligner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fakes.renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        recorder.statuses_for(Stage::Script),
        vec![StageStatus::Pending, StageStatus::Processing, StageStatus::Error]
    );
}

#[tokio::test(start_paused = true)]
async fn primary_retries_back_off_linearly() {
    let fakes = Fakes::with_voices(&[Outcome::Fail, Outcome::Fail], Outcome::Succeed, &[], Outcome::Succeed);
    let started = Instant::now();

    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(fakes.primary.call_count(), 3);
    assert_eq!(fakes.fallback.call_count(), 0);
    let times = fakes.primary.call_times();
    assert_eq!(times[0] - started, Duration::ZERO);
    assert_eq!(times[1] - times[0], Duration::from_secs(3));
    assert_eq!(times[2] - times[1], Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn exhausted_primary_falls_back_once_without_extra_wait() {
    let fakes = Fakes::with_voices(&[], Outcome::Fail, &[], Outcome::Succeed);

    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(fakes.primary.call_count(), 3);
    assert_eq!(fakes.fallback.call_count(), 1);
    let last_primary = *fakes.primary.call_times().last().unwrap();
    assert_eq!(fakes.fallback.call_times()[0] - last_primary, Duration::ZERO);
    assert!(run.audio_path().unwrap().to_string_lossy().ends_with(".mp3"));
}

#[tokio::test(start_paused = true)]
async fn failed_fallback_fails_the_audio_stage() {
    let fakes = Fakes::with_voices(&[], Outcome::Fail, &[], Outcome::Fail);
    let recorder = Recorder::default();

    let run = generator(&fakes).run(&request(2), &recorder).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(fakes.primary.call_count(), 2);
    assert_eq!(fakes.fallback.call_count(), 1);
    match run.failure() {
        Some(GenerationError::AudioExhausted { attempts, message }) => {
            assert_eq!(*attempts, 2);
            assert!(message.contains("primary"));
            assert!(message.contains("fallback"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(run.stage(Stage::Audio).status, StageStatus::Error);
    assert_eq!(run.stage(Stage::Captions).status, StageStatus::Pending);
    assert_eq!(fakes.aligner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn hung_attempt_counts_as_a_failure() {
    let fakes = Fakes::with_voices(&[Outcome::Hang], Outcome::Succeed, &[], Outcome::Succeed);

    let run = generator(&fakes).run(&request(2), &Recorder::default()).await;

    assert_eq!(run.status(), RunStatus::Completed);
    let times = fakes.primary.call_times();
    assert_eq!(times.len(), 2);
    assert_eq!(times[1] - times[0], Duration::from_secs(30 + 3));
    assert_eq!(fakes.fallback.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmatched_footage_fails_before_rendering() {
    let mut fakes = Fakes::happy();
    fakes.finder = Arc::new(FakeFinder {
        resolve: false,
        skip: Vec::new(),
        calls: AtomicUsize::new(0),
    });

    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.stage(Stage::Search).status, StageStatus::Success);
    assert_eq!(run.stage(Stage::Video).status, StageStatus::Error);
    assert_eq!(run.stage(Stage::Video).message, "no background footage matched");
    assert_eq!(fakes.renderer.calls.load(Ordering::SeqCst), 0);
}

fn assert_stopped_at(run: &topic_shorts::GenerationRun, fakes: &Fakes, failed: Stage) {
    assert_eq!(run.status(), RunStatus::Failed);
    assert_eq!(run.failure().and_then(GenerationError::failed_stage), Some(failed));
    assert_eq!(run.stage(failed).status, StageStatus::Error);
    assert!(run.stage(failed).artifact.is_none());
    assert_eq!(fakes.calls_for(failed), 1);
    for later in &Stage::ALL[failed.index() + 1..] {
        assert_eq!(run.stage(*later).status, StageStatus::Pending, "{later} should not have started");
        assert!(run.stage(*later).artifact.is_none());
        assert_eq!(fakes.calls_for(*later), 0, "{later} collaborator was called");
    }
    assert!(run.final_video().is_none());
}

#[tokio::test(start_paused = true)]
async fn caption_failure_stops_the_pipeline() {
    let mut fakes = Fakes::happy();
    fakes.aligner = Arc::new(FakeAligner {
        fail: true,
        calls: AtomicUsize::new(0),
    });

    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    assert_stopped_at(&run, &fakes, Stage::Captions);
    assert!(run.stage(Stage::Captions).message.contains("transcription HTTP 500"));
    assert_eq!(run.stage(Stage::Audio).status, StageStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn search_failure_stops_the_pipeline() {
    let mut fakes = Fakes::happy();
    fakes.planner = Arc::new(FakePlanner {
        fail: true,
        calls: AtomicUsize::new(0),
    });
    let recorder = Recorder::default();

    let run = generator(&fakes).run(&request(3), &recorder).await;

    assert_stopped_at(&run, &fakes, Stage::Search);
    assert!(run.stage(Stage::Search).message.contains("HTTP 429"));
    assert_eq!(
        recorder.statuses_for(Stage::Video),
        vec![StageStatus::Pending],
    );
}

#[tokio::test(start_paused = true)]
async fn render_failure_fails_the_run() {
    let mut fakes = Fakes::happy();
    fakes.renderer = Arc::new(FakeRenderer {
        fail: true,
        calls: AtomicUsize::new(0),
        gate: None,
    });

    let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

    assert_stopped_at(&run, &fakes, Stage::Render);
    assert!(run.stage(Stage::Render).message.contains("ffmpeg failed"));
    assert_eq!(run.stage(Stage::Video).status, StageStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn partially_matched_footage_is_gap_filled() {
    for (skip, url) in [(1, "https://footage.test/0.mp4"), (0, "https://footage.test/1.mp4")] {
        let mut fakes = Fakes::happy();
        fakes.finder = Arc::new(FakeFinder {
            resolve: true,
            skip: vec![skip],
            calls: AtomicUsize::new(0),
        });

        let run = generator(&fakes).run(&request(3), &Recorder::default()).await;

        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(fakes.calls_for(Stage::Render), 1);
        match &run.stage(Stage::Video).artifact {
            Some(Artifact::Footage(footage)) => {
                assert_eq!(footage.len(), 1);
                assert_eq!(footage[0].url.as_deref(), Some(url));
                assert_eq!(footage[0].interval, Interval::new(0.0, 4.0));
            }
            other => panic!("unexpected video artifact: {other:?}"),
        }
    }
}
