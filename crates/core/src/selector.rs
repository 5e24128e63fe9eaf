//! Round-robin host selection with health-aware probing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::health::HealthTracker;

/// Default share of the candidate list probed for a usable host
pub const DEFAULT_PROBE_PERCENT: u32 = 50;

/// Picks one host per call from an ordered candidate list
///
/// All callers share one counter, so concurrent selections take turns
/// across the list. The counter advances on every probe whether or not the
/// probed host is usable, which keeps the long-run distribution even while
/// some nodes are down.
#[derive(Debug)]
pub struct HostSelector {
    counter: AtomicUsize,
    probe_percent: u32,
}

impl HostSelector {
    /// Create a selector whose counter starts at a clock-derived offset
    pub fn new(probe_percent: u32) -> Self {
        Self::with_start(probe_percent, clock_seed())
    }

    /// Create a selector with an explicit starting turn
    pub fn with_start(probe_percent: u32, start: usize) -> Self {
        Self {
            counter: AtomicUsize::new(start),
            probe_percent,
        }
    }

    /// Maximum number of probes for a list of `len` candidates
    pub fn probe_budget(&self, len: usize) -> usize {
        let scaled = (len * self.probe_percent as usize).div_ceil(100);
        (scaled + 1).min(len).max(1)
    }

    /// Choose the next host from `candidates`
    ///
    /// Returns the first usable host within the probe budget, or the last
    /// probed host when every probe lands on an unhealthy one.
    pub fn next_host(&self, candidates: &[String], health: &HealthTracker) -> Result<String> {
        match candidates.len() {
            0 => Err(Error::Config("No storage hosts are configured".to_string())),
            1 => Ok(candidates[0].clone()),
            len => {
                let budget = self.probe_budget(len);
                let mut chosen = &candidates[0];
                for _ in 0..budget {
                    let turn = self.counter.fetch_add(1, Ordering::Relaxed);
                    chosen = &candidates[turn % len];
                    if health.is_usable(chosen) {
                        return Ok(chosen.clone());
                    }
                }
                tracing::debug!(
                    host = %chosen,
                    budget = budget,
                    "No usable host within probe budget"
                );
                Ok(chosen.clone())
            }
        }
    }
}

impl Default for HostSelector {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_PERCENT)
    }
}

/// Starting offset so separate processes do not all begin on the first host
fn clock_seed() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    fn hosts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{i}:9000")).collect()
    }

    #[test]
    fn test_empty_candidates_is_config_error() {
        let selector = HostSelector::default();
        let err = selector
            .next_host(&[], &HealthTracker::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_single_candidate_ignores_health() {
        let selector = HostSelector::default();
        let health = HealthTracker::default();
        let only = vec!["solo:9000".to_string()];
        health.report_failure("solo:9000");

        for _ in 0..5 {
            assert_eq!(selector.next_host(&only, &health).unwrap(), "solo:9000");
        }
    }

    #[test]
    fn test_probe_budget() {
        let selector = HostSelector::with_start(50, 0);
        assert_eq!(selector.probe_budget(1), 1);
        assert_eq!(selector.probe_budget(2), 2);
        assert_eq!(selector.probe_budget(3), 3);
        assert_eq!(selector.probe_budget(10), 6);

        let narrow = HostSelector::with_start(10, 0);
        assert_eq!(narrow.probe_budget(10), 2);
        assert_eq!(narrow.probe_budget(2), 2);
    }

    #[test]
    fn test_round_robin_distribution() {
        let selector = Arc::new(HostSelector::default());
        let health = Arc::new(HealthTracker::default());
        let candidates = Arc::new(hosts(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = selector.clone();
                let health = health.clone();
                let candidates = candidates.clone();
                thread::spawn(move || {
                    let mut counts: HashMap<String, usize> = HashMap::new();
                    for _ in 0..1000 {
                        let host = selector.next_host(&candidates, &health).unwrap();
                        *counts.entry(host).or_default() += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for (host, n) in handle.join().unwrap() {
                *totals.entry(host).or_default() += n;
            }
        }

        // Every selection advances the shared counter exactly once, so the
        // split is exact when all hosts are healthy.
        assert_eq!(totals.len(), 4);
        for n in totals.values() {
            assert_eq!(*n, 2000);
        }
    }

    #[test]
    fn test_unhealthy_host_avoided() {
        let selector = HostSelector::default();
        let health = HealthTracker::default();
        let candidates = hosts(3);
        health.report_failure(&candidates[1]);

        for _ in 0..100 {
            let host = selector.next_host(&candidates, &health).unwrap();
            assert_ne!(host, candidates[1]);
        }

        health.report_success(&candidates[1]);
        let picked: Vec<String> = (0..3)
            .map(|_| selector.next_host(&candidates, &health).unwrap())
            .collect();
        assert!(picked.contains(&candidates[1]));
    }

    #[test]
    fn test_two_hosts_one_down() {
        let selector = HostSelector::with_start(DEFAULT_PROBE_PERCENT, 0);
        let health = HealthTracker::default();
        let candidates = hosts(2);
        health.report_failure(&candidates[0]);

        for _ in 0..10 {
            assert_eq!(selector.next_host(&candidates, &health).unwrap(), candidates[1]);
        }
    }

    #[test]
    fn test_all_unhealthy_terminates() {
        let selector = HostSelector::with_start(DEFAULT_PROBE_PERCENT, 0);
        let health = HealthTracker::default();
        let candidates = hosts(5);
        for host in &candidates {
            health.report_failure(host);
        }

        let host = selector.next_host(&candidates, &health).unwrap();
        assert!(candidates.contains(&host));
        // Budget for 5 hosts at 50% is 4 probes
        assert_eq!(selector.counter.load(Ordering::Relaxed), 4);
    }
}
