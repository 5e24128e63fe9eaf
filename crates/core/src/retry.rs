//! Bounded retry across storage hosts
//!
//! Every network-bound operation runs through [`retry_with_hosts`]: pick a
//! host, run the action against it, report the outcome to the health
//! tracker, and try again on another pick while attempts remain.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::health::HealthTracker;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

/// Run `action` against hosts chosen by `select_host` until it succeeds
///
/// Host-source errors (no hosts configured, discovery failure) are returned
/// at once. Host faults mark the host unhealthy and are retried up to
/// `config.max_attempts` in total; the last error is returned unchanged.
/// Any other error means the node answered, so the host is reported
/// healthy and the error is returned without retrying.
///
/// # Example
/// ```ignore
/// let body = retry_with_hosts(
///     &config,
///     &health,
///     || async { selector.next_host(&hosts, &health) },
///     |host| async move { fetch(&host).await },
/// ).await?;
/// ```
pub async fn retry_with_hosts<T, S, SFut, F, Fut>(
    config: &RetryConfig,
    health: &HealthTracker,
    mut select_host: S,
    mut action: F,
) -> Result<T>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<String>>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let host = select_host().await?;

        match action(host.clone()).await {
            Ok(result) => {
                health.report_success(&host);
                return Ok(result);
            }
            Err(e) if !e.is_host_fault() => {
                health.report_success(&host);
                return Err(e);
            }
            Err(e) => {
                health.report_failure(&host);
                if attempt >= max_attempts {
                    tracing::debug!(
                        attempt = attempt,
                        host = %host,
                        error = %e,
                        unhealthy = ?health.snapshot(),
                        "Giving up after final attempt"
                    );
                    return Err(e);
                }

                let backoff = config.backoff(attempt);
                tracing::debug!(
                    attempt = attempt,
                    host = %host,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Retrying on another host"
                );

                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryBuilder {
        RetryBuilder::new()
    }

    /// Pause before the attempt that follows `attempt`
    ///
    /// Doubles from `initial_backoff_ms` up to `max_backoff_ms`; the upper
    /// half of each step is randomized.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.initial_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let step = self
            .initial_backoff_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
            .min(self.max_backoff_ms.max(self.initial_backoff_ms));
        let floor = step / 2;
        Duration::from_millis(floor + spread(step - floor))
    }
}

/// Uniform-ish value in `0..=max`
fn spread(max: u64) -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    if max == 0 {
        return 0;
    }
    RandomState::new().hash_one(std::time::Instant::now()) % (max + 1)
}

/// Builder for [`RetryConfig`], starting from the defaults
#[derive(Debug, Clone, Default)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt ceiling; zero is raised to one
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// First pause; zero disables backoff
    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}
