//! Active host checks
//!
//! Sends one HEAD to every candidate host and feeds the outcome into the
//! shared health tracker, then reports what the tracker holds.

use std::time::Duration;

use ns_core::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::ACCEPT_ENCODING;
use serde::Serialize;

use crate::client::{StorageClient, network_error};

/// Health of one candidate host after a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub host: String,
    pub usable: bool,
    pub failures: u32,
    pub cooldown_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StorageClient {
    /// Check every candidate host concurrently
    ///
    /// A host counts as answering when its bucket info route returns 200
    /// or 404. Results follow the candidate order.
    pub async fn check_hosts(&self) -> Result<Vec<HostStatus>> {
        let router = self.router();
        let hosts = router.candidate_hosts().await?;
        let outcomes = futures::future::join_all(hosts.iter().map(|h| self.check_host(h))).await;

        let snapshot = router.health().snapshot();
        tracing::debug!(hosts = hosts.len(), unhealthy = ?snapshot, "Host check finished");

        Ok(hosts
            .into_iter()
            .zip(outcomes)
            .map(|(host, outcome)| {
                let cooldown = snapshot
                    .iter()
                    .find(|h| h.host == host)
                    .map_or(Duration::ZERO, |h| h.cooldown_remaining);
                HostStatus {
                    usable: router.health().is_usable(&host),
                    failures: router.health().failure_count(&host),
                    cooldown_ms: cooldown.as_millis() as u64,
                    error: outcome.err().map(|e| e.to_string()),
                    host,
                }
            })
            .collect())
    }

    async fn check_host(&self, host: &str) -> Result<()> {
        let shared = &self.shared;
        let result = async {
            let url = shared.url(host, &["objects", "getbucket", shared.bucket.as_str()], None)?;
            let response = shared
                .http
                .head(url)
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await
                .map_err(network_error)?;
            match response.status() {
                StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
                status => Err(Error::status(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown status"),
                )),
            }
        }
        .await;

        let health = shared.router.health();
        match &result {
            Ok(()) => health.report_success(host),
            Err(_) => health.report_failure(host),
        }
        result
    }
}
