//! Fixed-cadence polling of a run until it reaches a terminal status.
//!
//! The status handling is split in two: [`classify`] is a pure mapping from
//! an observed run to the next step, and [`RunPoller::await_completion`] owns
//! the sleep/query side effects around it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::assistant_api::{AssistantApi, Run, RunStatus};
use crate::error::RelayError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// Upper bound on how long one run is waited for, `None` if it does not
    /// fit in a `Duration`.
    pub fn budget(&self) -> Option<Duration> {
        self.interval.checked_mul(self.max_attempts)
    }
}

/// What to do after observing a run.
#[derive(Debug)]
pub enum PollStep {
    Continue,
    Completed,
    Failed(RelayError),
}

/// How a polling session ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(Run),
    /// The attempt budget ran out before any terminal status was seen.
    Exhausted { attempts: u32 },
}

pub fn classify(run: &Run) -> PollStep {
    match run.status {
        RunStatus::Completed => PollStep::Completed,
        RunStatus::RequiresAction => PollStep::Failed(RelayError::RunRequiresAction),
        RunStatus::Expired => PollStep::Failed(RelayError::RunExpired),
        RunStatus::Failed => PollStep::Failed(RelayError::RunFailed {
            reason: run
                .last_error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Unknown error".to_string()),
        }),
        RunStatus::Cancelled => PollStep::Failed(RelayError::RunCancelled),
        RunStatus::Incomplete => PollStep::Failed(RelayError::RunIncomplete {
            reason: run
                .incomplete_details
                .as_ref()
                .and_then(|d| d.reason.clone())
                .unwrap_or_else(|| "unspecified".to_string()),
        }),
        RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling | RunStatus::Unknown => {
            PollStep::Continue
        }
    }
}

pub struct RunPoller {
    api: Arc<dyn AssistantApi>,
    policy: PollPolicy,
}

impl RunPoller {
    pub fn new(api: Arc<dyn AssistantApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Sleeps one interval, then queries the run, up to `max_attempts` times.
    ///
    /// Stops on the first terminal status. Running out of attempts is not an
    /// error here; the caller decides what an exhausted poll means.
    #[instrument(skip(self))]
    pub async fn await_completion(&self, thread_id: &str, run_id: &str) -> Result<PollOutcome, RelayError> {
        let mut attempts = 0;
        while attempts < self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;

            let run = self
                .api
                .retrieve_run(thread_id, run_id)
                .await
                .map_err(RelayError::Poll)?;
            debug!(attempt = attempts + 1, status = ?run.status, "Polled run");

            match classify(&run) {
                PollStep::Completed => {
                    info!(attempts = attempts + 1, "Run completed");
                    return Ok(PollOutcome::Completed(run));
                }
                PollStep::Failed(e) => {
                    warn!(status = ?run.status, "Run ended without completing: {}", e);
                    return Err(e);
                }
                PollStep::Continue => attempts += 1,
            }
        }

        warn!(attempts, "Gave up waiting for run");
        Ok(PollOutcome::Exhausted { attempts })
    }
}
