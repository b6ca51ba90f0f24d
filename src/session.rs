use crate::error::GenerationError;
use crate::generator::Generator;
use crate::observer::RunObserver;
use crate::run::{GenerationRequest, GenerationRun, RunStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Holds at most one run and refuses to start another while it generates.
pub struct Session {
    generator: Generator,
    running: AtomicBool,
    last_run: Mutex<Option<GenerationRun>>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.running.load(Ordering::SeqCst) {
            return RunStatus::Generating;
        }
        self.last_run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(GenerationRun::status)
            .unwrap_or(RunStatus::Ready)
    }

    pub fn last_run(&self) -> Option<GenerationRun> {
        self.last_run.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Starts a fresh run, discarding any finished one.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        observer: &dyn RunObserver,
    ) -> Result<GenerationRun, GenerationError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GenerationError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.last_run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let run = self.generator.run(request, observer).await;
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(run.clone());
        Ok(run)
    }

    /// Discards a finished run so the session is ready again.
    pub fn try_again(&self) -> Result<(), GenerationError> {
        let status = self.status();
        if !status.is_terminal() {
            return Err(GenerationError::NotTerminal(status));
        }
        self.last_run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        Ok(())
    }
}
