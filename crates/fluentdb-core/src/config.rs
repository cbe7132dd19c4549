//! Client configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{ClientError, ClientResult};

/// Bounded retry policy shared by every outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Backoff floor between attempts.
    pub min_backoff: Duration,
    /// Backoff ceiling between attempts.
    pub max_backoff: Duration,
    /// Latency budget of the first attempt. Attempt `n` gets `n` times this,
    /// scaled by the patience ratio.
    pub base_latency: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(5000),
            base_latency: Duration::from_millis(1000),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Multiplier applied to every attempt deadline. Must be positive.
    pub patience: f64,
    /// Parallel segments used by a Scan that does not set its own.
    pub scan_segments: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            patience: 1.0,
            scan_segments: 10,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their default. A non-positive
    /// patience ratio is rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_attempts: parse_or("FLUENTDB_MAX_ATTEMPTS", &lookup, defaults.retry.max_attempts)
                .max(1),
            min_backoff: millis_or(
                "FLUENTDB_MIN_BACKOFF_MS",
                &lookup,
                defaults.retry.min_backoff,
            ),
            max_backoff: millis_or(
                "FLUENTDB_MAX_BACKOFF_MS",
                &lookup,
                defaults.retry.max_backoff,
            ),
            base_latency: millis_or(
                "FLUENTDB_BASE_LATENCY_MS",
                &lookup,
                defaults.retry.base_latency,
            ),
        };
        let config = Self {
            retry,
            patience: parse_or("FLUENTDB_PATIENCE", &lookup, defaults.patience),
            scan_segments: parse_or("FLUENTDB_SCAN_SEGMENTS", &lookup, defaults.scan_segments)
                .max(1),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that cannot be defaulted away.
    pub fn validate(&self) -> ClientResult<()> {
        validate_patience(self.patience)?;
        if self.retry.min_backoff > self.retry.max_backoff {
            return Err(ClientError::Config(format!(
                "min backoff {:?} exceeds max backoff {:?}",
                self.retry.min_backoff, self.retry.max_backoff
            )));
        }
        Ok(())
    }
}

/// Reject patience ratios that are not strictly positive and finite.
pub(crate) fn validate_patience(ratio: f64) -> ClientResult<()> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(ClientError::Config(format!(
            "patience ratio must be positive, got {ratio}"
        )))
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "invalid configuration value, using default");
            default
        }),
    }
}

fn millis_or(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: Duration) -> Duration {
    let millis = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(parse_or(key, lookup, millis))
}
