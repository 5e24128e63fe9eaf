//! Host discovery over HTTP
//!
//! Asks the discovery ("uc") hosts which storage nodes serve an identity:
//! `GET /v4/query?ak=<account>&bucket=<bucket>`.

use std::time::Duration;

use async_trait::async_trait;
use ns_core::{
    Config, Discovered, Error, HostClass, HostDiscovery, HostRouter, Identity, Result,
};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::client::{USER_AGENT, expect_status, network_error};

/// TTL applied when the response names no hosts
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

const QUERY_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const QUERY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    hosts: Vec<QueryHost>,
}

#[derive(Debug, Deserialize)]
struct QueryHost {
    /// Seconds the answer stays fresh
    #[serde(default)]
    ttl: u64,
    #[serde(default)]
    io: QueryDomains,
}

#[derive(Debug, Default, Deserialize)]
struct QueryDomains {
    #[serde(default)]
    domains: Vec<String>,
}

/// [`HostDiscovery`] backed by the discovery service
pub struct HttpDiscovery {
    http: reqwest::Client,
    router: HostRouter,
    https: bool,
}

impl HttpDiscovery {
    /// Discovery client over `config.uc_hosts`
    ///
    /// The discovery hosts get their own health state and short timeouts.
    pub fn new(config: &Config) -> Result<Self> {
        if config.uc_hosts.is_empty() {
            return Err(Error::Config("No discovery hosts configured".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(QUERY_CONNECT_TIMEOUT)
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let router = HostRouter::builder(config.uc_hosts.clone())
            .retry(config.retry_config())
            .probe_percent(config.probe_percent)
            .health_config(config.health)
            .build();

        Ok(Self {
            http,
            router,
            https: config.https,
        })
    }

    fn query_url(&self, host: &str, identity: &Identity) -> Result<Url> {
        let base = if host.contains("://") {
            host.to_string()
        } else if self.https {
            format!("https://{host}")
        } else {
            format!("http://{host}")
        };
        let mut url = Url::parse(&base)
            .and_then(|u| u.join("/v4/query"))
            .map_err(|e| Error::Config(format!("Invalid discovery host {host}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("ak", &identity.account)
            .append_pair("bucket", &identity.bucket);
        Ok(url)
    }
}

#[async_trait]
impl HostDiscovery for HttpDiscovery {
    async fn fetch_hosts(&self, identity: &Identity) -> Result<Discovered> {
        let response: QueryResponse = self
            .router
            .run(HostClass::Download, |host| async move {
                let url = self.query_url(&host, identity)?;
                let response = self.http.get(url).send().await.map_err(network_error)?;
                let response = expect_status(response, &[StatusCode::OK], "discovery").await?;
                let body = response.bytes().await.map_err(network_error)?;
                Ok(serde_json::from_slice(&body)?)
            })
            .await?;

        let discovered = into_discovered(response);
        tracing::debug!(
            identity = %identity,
            hosts = discovered.hosts.len(),
            ttl_secs = discovered.ttl.as_secs(),
            "Discovery answered"
        );
        Ok(discovered)
    }
}

/// Only the first host group is used; a zero TTL gets [`DEFAULT_TTL`]
fn into_discovered(response: QueryResponse) -> Discovered {
    match response.hosts.into_iter().next() {
        Some(group) if !group.io.domains.is_empty() => Discovered {
            hosts: group.io.domains,
            ttl: match group.ttl {
                0 => DEFAULT_TTL,
                secs => Duration::from_secs(secs),
            },
        },
        _ => Discovered {
            hosts: Vec::new(),
            ttl: DEFAULT_TTL,
        },
    }
}
