use crate::run::RunStatus;
use crate::stage::{Stage, StageStatus};
use tracing::{info, warn};

/// Receives every stage-state transition as it happens.
pub trait RunObserver: Send + Sync {
    fn on_stage_transition(&self, stage: Stage, status: StageStatus, message: &str);

    fn on_run_status(&self, _status: RunStatus) {}
}

impl<F> RunObserver for F
where
    F: Fn(Stage, StageStatus, &str) + Send + Sync,
{
    fn on_stage_transition(&self, stage: Stage, status: StageStatus, message: &str) {
        self(stage, status, message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_stage_transition(&self, _stage: Stage, _status: StageStatus, _message: &str) {}
}

/// Writes transitions to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl RunObserver for LoggingObserver {
    fn on_stage_transition(&self, stage: Stage, status: StageStatus, message: &str) {
        match status {
            StageStatus::Error => warn!(stage = %stage, status = %status, "{message}"),
            _ => info!(stage = %stage, status = %status, "{message}"),
        }
    }

    fn on_run_status(&self, status: RunStatus) {
        info!(run_status = %status, "run status changed");
    }
}
