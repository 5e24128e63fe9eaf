//! Passive host health tracking
//!
//! Hosts are marked unhealthy only by explicit failure reports from
//! requests. A failed host sits out an exponentially growing cooldown and
//! becomes eligible again once it elapses, or immediately on a success
//! report, so no host is ever excluded for good.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Recovery policy for failed hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Cooldown after the first consecutive failure
    pub base_cooldown_ms: u64,
    /// Upper bound for the cooldown
    pub max_cooldown_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            base_cooldown_ms: 5_000,
            max_cooldown_ms: 120_000,
        }
    }
}

impl HealthConfig {
    /// Cooldown for the given number of consecutive failures
    fn cooldown(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        let ms = self
            .base_cooldown_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_cooldown_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthRecord {
    failures: u32,
    retry_at: Instant,
}

/// Point-in-time view of one tracked host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHealth {
    pub host: String,
    pub failures: u32,
    /// Time left before the host is eligible again (zero when usable)
    pub cooldown_remaining: Duration,
}

/// Shared health state keyed by host address
///
/// One tracker is shared by every operation kind of a client, so a node
/// that failed a download is also avoided for uploads.
#[derive(Debug, Default)]
pub struct HealthTracker {
    config: HealthConfig,
    records: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Mark a host as failed and start (or extend) its cooldown
    pub fn report_failure(&self, host: &str) {
        let now = Instant::now();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(host.to_string()).or_insert(HealthRecord {
            failures: 0,
            retry_at: now,
        });
        record.failures = record.failures.saturating_add(1);
        let cooldown = self.config.cooldown(record.failures);
        record.retry_at = now + cooldown;

        tracing::debug!(
            host = %host,
            failures = record.failures,
            cooldown_ms = cooldown.as_millis() as u64,
            "Host marked unhealthy"
        );
    }

    /// Mark a host as healthy, clearing any failure state
    pub fn report_success(&self, host: &str) {
        // Fast path: nothing to clear for hosts that never failed
        if !self.is_tracked(host) {
            return;
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.remove(host).is_some() {
            tracing::debug!(host = %host, "Host recovered");
        }
    }

    /// Whether the host may be selected right now
    pub fn is_usable(&self, host: &str) -> bool {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(host)
            .is_none_or(|record| Instant::now() >= record.retry_at)
    }

    /// Consecutive failures recorded for a host
    pub fn failure_count(&self, host: &str) -> u32 {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(host).map(|r| r.failures).unwrap_or(0)
    }

    /// Every host with recorded failures, sorted by address
    pub fn snapshot(&self) -> Vec<HostHealth> {
        let now = Instant::now();
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut hosts: Vec<HostHealth> = records
            .iter()
            .map(|(host, record)| HostHealth {
                host: host.clone(),
                failures: record.failures,
                cooldown_remaining: record.retry_at.saturating_duration_since(now),
            })
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        hosts
    }

    fn is_tracked(&self, host: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(host)
    }
}
