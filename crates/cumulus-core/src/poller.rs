//! Operation poller
//!
//! Waits for a remote resource to reach one of a set of target statuses.
//! The first check happens after [`PollPolicy::delay`] to absorb the
//! eventual-consistency lag right after an API call returns; later checks
//! are spaced at least [`PollPolicy::min_interval`] apart. The deadline is
//! checked before every remote call, so no call is made after it expires.

use async_trait::async_trait;
use cumulus_config::Polling;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Status reported when absence of the resource is the target
pub const DELETED: &str = "deleted";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// What a single status lookup saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Status(String),
    NotFound,
}

/// A failed status lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Retried on the next interval
    Transient(String),
    /// Aborts the wait
    Hard(String),
}

/// Classification of a lookup against a [`PollPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending(String),
    TargetReached(String),
    TerminalFailure(String),
    NotFound,
}

/// Source of status lookups for one resource
#[async_trait]
pub trait StatusSource: Send {
    async fn refresh(&mut self) -> Result<Refresh, RefreshError>;
}

/// Parameters of one waiting session
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Statuses that end the wait successfully
    pub targets: Vec<String>,
    /// Allow-list of in-progress statuses; anything outside it and the
    /// targets is a terminal failure. `None` keeps waiting on any status.
    pub pending: Option<Vec<String>>,
    pub timeout: Duration,
    pub delay: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    /// Treat a not-found lookup as reaching the target (delete polling)
    pub not_found_is_target: bool,
    /// Consecutive not-found lookups tolerated otherwise
    pub not_found_checks: u32,
}

impl PollPolicy {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let polling = Polling::default();
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            pending: None,
            timeout: DEFAULT_TIMEOUT,
            delay: polling.delay(),
            min_interval: polling.min_interval(),
            max_interval: polling.max_interval(),
            backoff_multiplier: polling.backoff_multiplier,
            not_found_is_target: false,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    /// Policy for waiting until the resource no longer exists
    pub fn until_gone() -> Self {
        Self {
            not_found_is_target: true,
            ..Self::new([DELETED])
        }
    }

    pub fn with_pending<I, S>(mut self, pending: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = Some(pending.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self.max_interval = self.max_interval.max(interval);
        self
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_interval = max_interval.max(self.min_interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Apply the configured poll cadence
    pub fn with_polling(self, polling: &Polling) -> Self {
        self.with_delay(polling.delay())
            .with_min_interval(polling.min_interval())
            .with_backoff(polling.backoff_multiplier, polling.max_interval())
    }

    pub fn classify(&self, refresh: &Refresh) -> PollStatus {
        match refresh {
            Refresh::NotFound if self.not_found_is_target => {
                PollStatus::TargetReached(DELETED.to_string())
            }
            Refresh::NotFound => PollStatus::NotFound,
            Refresh::Status(status) => {
                if self.targets.iter().any(|t| t == status) {
                    PollStatus::TargetReached(status.clone())
                } else if self
                    .pending
                    .as_ref()
                    .is_some_and(|pending| !pending.iter().any(|p| p == status))
                {
                    PollStatus::TerminalFailure(status.clone())
                } else {
                    PollStatus::Pending(status.clone())
                }
            }
        }
    }

    /// Interval after `current`, never below the floor nor above the ceiling
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return current.max(self.min_interval);
        }
        current
            .mul_f64(self.backoff_multiplier)
            .clamp(self.min_interval, self.max_interval)
    }
}

/// A wait that reached one of its targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: String,
    pub polls: u32,
    pub elapsed: Duration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error(
        "timed out after {elapsed:?} and {polls} polls (last status: {}, last error: {})",
        last_status.as_deref().unwrap_or("none"),
        last_error.as_deref().unwrap_or("none")
    )]
    TimedOut {
        last_status: Option<String>,
        last_error: Option<String>,
        elapsed: Duration,
        polls: u32,
    },

    #[error("unexpected status `{status}` after {polls} polls")]
    TerminalFailure { status: String, polls: u32 },

    #[error("resource not found after {checks} consecutive checks")]
    NotFound { checks: u32 },

    #[error("cancelled after {polls} polls")]
    Cancelled { polls: u32 },

    #[error("status lookup failed: {0}")]
    Aborted(String),
}

/// Sleep until `wake`; false when cancelled first
async fn pause(wake: Instant, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep_until(wake) => true,
    }
}

/// Poll `source` until it reports a target status
pub async fn wait_for_state<S>(
    policy: &PollPolicy,
    source: &mut S,
    cancel: &CancellationToken,
) -> Result<PollOutcome, PollError>
where
    S: StatusSource + ?Sized,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut polls = 0u32;
    let mut not_found = 0u32;
    let mut last_status: Option<String> = None;
    let mut last_error: Option<String> = None;

    if !policy.delay.is_zero() && !pause((started + policy.delay).min(deadline), cancel).await {
        return Err(PollError::Cancelled { polls });
    }

    let mut interval = policy.min_interval;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { polls });
        }
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                "Gave up waiting for {:?} after {} polls",
                policy.targets,
                polls
            );
            return Err(PollError::TimedOut {
                last_status,
                last_error,
                elapsed: now - started,
                polls,
            });
        }

        polls += 1;
        match source.refresh().await {
            Ok(refresh) => match policy.classify(&refresh) {
                PollStatus::TargetReached(status) => {
                    tracing::debug!("Reached status {} after {} polls", status, polls);
                    return Ok(PollOutcome {
                        status,
                        polls,
                        elapsed: Instant::now() - started,
                    });
                }
                PollStatus::TerminalFailure(status) => {
                    return Err(PollError::TerminalFailure { status, polls });
                }
                PollStatus::Pending(status) => {
                    tracing::debug!("Poll {}: status {} is pending", polls, status);
                    not_found = 0;
                    last_status = Some(status);
                    last_error = None;
                }
                PollStatus::NotFound => {
                    not_found += 1;
                    tracing::debug!("Poll {}: not found ({} in a row)", polls, not_found);
                    if not_found > policy.not_found_checks {
                        return Err(PollError::NotFound { checks: not_found });
                    }
                }
            },
            Err(RefreshError::Transient(message)) => {
                tracing::warn!("Poll {}: status lookup failed, retrying: {}", polls, message);
                last_error = Some(message);
            }
            Err(RefreshError::Hard(message)) => return Err(PollError::Aborted(message)),
        }

        if !pause((Instant::now() + interval).min(deadline), cancel).await {
            return Err(PollError::Cancelled { polls });
        }
        interval = policy.next_interval(interval);
    }
}
