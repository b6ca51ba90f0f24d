use crate::run::GenerationRequest;
use std::time::Duration;

pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(3);

/// Attempt budget for the narration stage.
///
/// The primary provider gets `max_attempts` tries, each bounded by
/// `attempt_timeout`. After failed attempt `n` (1-based) the stage waits
/// `n * backoff_step` before trying again; there is no wait after the last
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_step: Duration,
}

impl AudioRetryPolicy {
    pub fn for_request(request: &GenerationRequest, backoff_step: Duration) -> Self {
        Self {
            max_attempts: request.max_retries.max(1),
            attempt_timeout: request.timeout,
            backoff_step,
        }
    }

    /// Delay after failed attempt `attempt`, or `None` when it was the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.backoff_step * attempt)
    }
}
