//! Polling a task until it reaches a terminal state.
//!
//! Business states and transport failures are handled asymmetrically: a
//! `failed` or unrecognised state ends the loop, while network errors and
//! non-success statuses (other than 401/403) are retried after
//! [`PollConfig::error_backoff`] for as long as the caller lets the loop run.
//! Every wait is raced against a [`CancellationToken`].

use crate::client::Hitem3dClient;
use crate::error::Hitem3dError;
use crate::types::TaskState;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Timing of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between queries while the task is still running.
    pub interval: Duration,
    /// Delay after a transient failure.
    pub error_backoff: Duration,
    /// Give up after this many queries. `None` polls forever.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed. `None` polls forever.
    pub max_duration: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(5),
            max_attempts: None,
            max_duration: None,
        }
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    /// The model is ready at `url`.
    Success { url: String },
    /// The service reported `failed`.
    Failed,
    /// The service reported a state this client does not understand.
    Unknown { state: String },
}

impl TerminalState {
    /// Returns the model URL, or `RemoteTaskFailure` for failed and unknown states.
    pub fn into_url(self, task_id: &str) -> Result<String, Hitem3dError> {
        match self {
            TerminalState::Success { url } => Ok(url),
            TerminalState::Failed => Err(Hitem3dError::RemoteTaskFailure {
                task_id: task_id.to_string(),
                state: TaskState::Failed.to_string(),
            }),
            TerminalState::Unknown { state } => Err(Hitem3dError::RemoteTaskFailure {
                task_id: task_id.to_string(),
                state,
            }),
        }
    }
}

/// Observability hook payload. Has no effect on control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Overall progress estimate in `[0.0, 1.0]`, never decreasing within one run.
    pub progress: f32,
    /// The remote state, or a pipeline stage label.
    pub state: String,
}

// Progress band the poller reports in; the orchestrator owns the rest.
const POLL_PROGRESS_START: f32 = 0.2;
const POLL_PROGRESS_CEILING: f32 = 0.85;

/// Estimates progress from the remote state and how often it has been seen.
///
/// The service reports no percentage, so `processing` creeps towards
/// [`POLL_PROGRESS_CEILING`] with every poll.
fn estimate_progress(state: &TaskState, processing_polls: u32) -> f32 {
    match state {
        TaskState::Created => POLL_PROGRESS_START,
        TaskState::Queueing => 0.3,
        TaskState::Processing => {
            let remaining = POLL_PROGRESS_CEILING - 0.5;
            0.5 + remaining * (1.0 - 0.9f32.powi(processing_polls.min(i32::MAX as u32) as i32))
        }
        _ => POLL_PROGRESS_CEILING,
    }
}

/// Repeatedly queries a task until it finishes, fails, or the caller stops it.
pub struct StatusPoller {
    client: Hitem3dClient,
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(client: Hitem3dClient, config: PollConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls `task_id` until it reaches a terminal state.
    ///
    /// `on_progress` is called once before every wait on a running task.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::Cancelled` as soon as `cancel` fires; no request is issued afterwards.
    /// - `Hitem3dError::TokenRejected` if the token is rejected, or
    ///   `Hitem3dError::Authentication` if no token can be obtained.
    /// - `Hitem3dError::MissingResultUrl` if `success` arrives without a URL.
    /// - `Hitem3dError::PollTimeout` when a configured attempt or time limit is hit.
    ///   The time limit also cuts short a query that is still in flight.
    pub async fn poll_until_terminal<F>(
        &self,
        task_id: &str,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<TerminalState, Hitem3dError>
    where
        F: FnMut(ProgressUpdate),
    {
        let started = Instant::now();
        let deadline = self.config.max_duration.map(|limit| started + limit);
        let mut attempts = 0u32;
        let mut processing_polls = 0u32;
        let mut reported = POLL_PROGRESS_START;

        loop {
            if cancel.is_cancelled() {
                return Err(Hitem3dError::Cancelled);
            }
            attempts = attempts.saturating_add(1);

            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Hitem3dError::Cancelled),
                _ = expired => return Err(self.timeout(attempts, started)),
                result = self.client.query_task(task_id) => result,
            };

            let delay = match result {
                Ok(status) => match status.state {
                    TaskState::Success => {
                        return match status.url {
                            Some(url) => {
                                tracing::info!(task_id, attempts, "Task finished successfully");
                                Ok(TerminalState::Success { url })
                            }
                            None => Err(Hitem3dError::MissingResultUrl {
                                task_id: task_id.to_string(),
                            }),
                        };
                    }
                    TaskState::Failed => {
                        tracing::warn!(task_id, attempts, "Task failed remotely");
                        return Ok(TerminalState::Failed);
                    }
                    TaskState::Unknown(state) => {
                        tracing::warn!(task_id, state = %state, "Task reported an unrecognised state");
                        return Ok(TerminalState::Unknown { state });
                    }
                    state => {
                        if state == TaskState::Processing {
                            processing_polls = processing_polls.saturating_add(1);
                        }
                        reported = reported.max(estimate_progress(&state, processing_polls));
                        tracing::debug!(task_id, state = %state, attempt = attempts, "Task still running");
                        on_progress(ProgressUpdate {
                            progress: reported,
                            state: state.to_string(),
                        });
                        self.config.interval
                    }
                },
                Err(e) if e.is_transient() => {
                    tracing::warn!(task_id, attempt = attempts, error = %e, "Polling failed, retrying");
                    self.config.error_backoff
                }
                Err(e) => return Err(e),
            };

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(self.timeout(attempts, started));
            }

            let delay = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(self.timeout(attempts, started));
                    }
                    delay.min(deadline - now)
                }
                None => delay,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Hitem3dError::Cancelled),
                _ = sleep(delay) => {}
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(self.timeout(attempts, started));
            }
        }
    }

    fn timeout(&self, attempts: u32, started: Instant) -> Hitem3dError {
        let elapsed = started.elapsed();
        tracing::warn!(attempts, ?elapsed, "Giving up on task polling");
        Hitem3dError::PollTimeout { attempts, elapsed }
    }
}
