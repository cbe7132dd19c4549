//! Bounded-latency retry ("short-circuit") execution.
//!
//! Every attempt races the outbound call against a deadline timer. Attempt `n`
//! gets `n × base_latency × patience`, so later attempts are more tolerant.
//! Failures classified retryable by [`ClientError::is_retryable`] back off
//! exponentially with jitter and try again until the attempt budget is spent;
//! anything else propagates at once.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use fluentdb_model::DynamoDBOperation;
use tracing::{debug, warn};

use crate::config::{RetryPolicy, validate_patience};
use crate::error::{ClientError, ClientResult};

/// Counters describing retry executor activity.
#[derive(Debug, Default)]
pub struct RetryStats {
    attempts: AtomicU64,
    armed: AtomicU64,
    disarmed: AtomicU64,
}

impl RetryStats {
    /// Attempts started.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Deadline timers set up.
    #[must_use]
    pub fn armed(&self) -> u64 {
        self.armed.load(Ordering::Relaxed)
    }

    /// Deadline timers torn down.
    #[must_use]
    pub fn disarmed(&self) -> u64 {
        self.disarmed.load(Ordering::Relaxed)
    }
}

/// Marks a deadline timer as live until dropped.
struct ArmedDeadline<'a> {
    stats: &'a RetryStats,
}

impl<'a> ArmedDeadline<'a> {
    fn arm(stats: &'a RetryStats) -> Self {
        stats.armed.fetch_add(1, Ordering::Relaxed);
        Self { stats }
    }
}

impl Drop for ArmedDeadline<'_> {
    fn drop(&mut self) {
        self.stats.disarmed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs outbound calls under a retry policy and per-attempt deadlines.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    patience: f64,
    stats: Arc<RetryStats>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            patience: 1.0,
            stats: Arc::new(RetryStats::default()),
        }
    }
}

impl RetryExecutor {
    /// Create an executor. Fails if `patience` is not positive.
    pub fn new(policy: RetryPolicy, patience: f64) -> ClientResult<Self> {
        validate_patience(patience)?;
        Ok(Self {
            policy,
            patience,
            stats: Arc::new(RetryStats::default()),
        })
    }

    /// Replace the patience ratio. Fails if `ratio` is not positive.
    pub fn set_patience(&mut self, ratio: f64) -> ClientResult<()> {
        validate_patience(ratio)?;
        self.patience = ratio;
        Ok(())
    }

    /// The current patience ratio.
    #[must_use]
    pub fn patience(&self) -> f64 {
        self.patience
    }

    /// The retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Activity counters, shared by clones of this executor.
    #[must_use]
    pub fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// Deadline for the 1-based `attempt`, saturating at `Duration::MAX`.
    #[must_use]
    pub fn deadline(&self, attempt: u32) -> Duration {
        let secs = self.policy.base_latency.as_secs_f64() * f64::from(attempt) * self.patience;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Backoff between attempts, yielding `max_attempts - 1` delays.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let retries = self.policy.max_attempts.saturating_sub(1);
        ExponentialBuilder::default()
            .with_min_delay(self.policy.min_backoff)
            .with_max_delay(self.policy.max_backoff)
            .with_max_times(usize::try_from(retries).unwrap_or(usize::MAX))
            .with_jitter()
    }

    /// Run `call` until it succeeds, fails terminally, or the budget runs out.
    ///
    /// `call` is invoked once per attempt. The last retryable error is
    /// returned when every attempt fails.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: DynamoDBOperation,
        mut call: F,
    ) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0u32;
        let run = move || {
            attempt += 1;
            let deadline = self.deadline(attempt);
            debug!(%operation, attempt, ?deadline, "sending request");
            self.short_circuit(deadline, call())
        };
        run.retry(self.backoff())
            .when(ClientError::is_retryable)
            .notify(|err: &ClientError, delay: Duration| {
                warn!(%operation, error = %err, ?delay, "request failed, retrying");
            })
            .await
    }

    async fn short_circuit<T, Fut>(&self, deadline: Duration, call: Fut) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        let _armed = ArmedDeadline::arm(&self.stats);
        tokio::select! {
            result = call => result,
            () = tokio::time::sleep(deadline) => Err(ClientError::DeadlineExceeded(deadline)),
        }
    }
}
