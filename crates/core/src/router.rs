//! Host router: the single entry point operation clients use to reach a
//! storage node.
//!
//! A router owns the health tracker, one selection counter per host class,
//! the retry policy and, optionally, a discovery cache. Nothing here is
//! global: two routers only share health state when they are handed the
//! same [`HealthTracker`].

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::discovery::{HostDiscovery, Identity, Queryer};
use crate::error::Result;
use crate::health::{HealthConfig, HealthTracker};
use crate::retry::{RetryConfig, retry_with_hosts};
use crate::selector::{DEFAULT_PROBE_PERCENT, HostSelector};
use crate::store::CacheStore;

/// Resource class; each class takes its own round-robin turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    Download,
    Upload,
}

/// Routes operations to healthy storage hosts with bounded retries
pub struct HostRouter {
    static_hosts: Vec<String>,
    identity: Identity,
    queryer: Option<Arc<Queryer>>,
    health: Arc<HealthTracker>,
    download: HostSelector,
    upload: HostSelector,
    retry: RetryConfig,
}

impl HostRouter {
    pub fn builder(static_hosts: Vec<String>) -> HostRouterBuilder {
        HostRouterBuilder::new(static_hosts)
    }

    /// Build a router from client configuration
    ///
    /// `discovery` is only used when the configuration names discovery
    /// hosts; its cache is persisted to [`Config::cache_file`].
    pub fn from_config(config: &Config, discovery: Option<Arc<dyn HostDiscovery>>) -> Self {
        let mut builder = Self::builder(config.io_hosts.clone())
            .identity(Identity::new(&config.access_key, &config.bucket))
            .retry(config.retry_config())
            .probe_percent(config.probe_percent)
            .health_config(config.health);

        if let Some(transport) = discovery
            && !config.uc_hosts.is_empty()
        {
            let store = config
                .cache_file()
                .map(CacheStore::new)
                .unwrap_or_else(CacheStore::disabled);
            builder = builder.queryer(Arc::new(Queryer::new(transport, store)));
        }

        builder.build()
    }

    /// Hosts to choose from for this router's identity
    ///
    /// Discovered hosts win when discovery returns any; otherwise the
    /// static list is used. A discovery failure only surfaces when there is
    /// no static list to fall back to.
    pub async fn candidate_hosts(&self) -> Result<Vec<String>> {
        let Some(queryer) = &self.queryer else {
            return Ok(self.static_hosts.clone());
        };

        match queryer.query_hosts(&self.identity).await {
            Ok(hosts) if !hosts.is_empty() => Ok(hosts),
            Ok(_) => Ok(self.static_hosts.clone()),
            Err(e) if !self.static_hosts.is_empty() => {
                tracing::warn!(
                    identity = %self.identity,
                    error = %e,
                    "Host discovery failed, using static hosts"
                );
                Ok(self.static_hosts.clone())
            }
            Err(e) => Err(e),
        }
    }

    /// Pick one host without running anything against it
    pub async fn next_host(&self, class: HostClass) -> Result<String> {
        let candidates = self.candidate_hosts().await?;
        self.selector(class).next_host(&candidates, &self.health)
    }

    /// Run `action` against a selected host with health reporting and retries
    ///
    /// The candidate list is looked up again on every attempt so a refreshed
    /// discovery result is picked up between retries. A failed cold discovery
    /// is remembered by the queryer, so retries fall back to static hosts
    /// without querying again.
    pub async fn run<T, F, Fut>(&self, class: HostClass, action: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let selector = self.selector(class);
        retry_with_hosts(
            &self.retry,
            &self.health,
            || async move {
                let candidates = self.candidate_hosts().await?;
                selector.next_host(&candidates, &self.health)
            },
            action,
        )
        .await
    }

    /// Like [`HostRouter::run`], but with a single attempt
    ///
    /// For actions that cannot be replayed, such as streamed uploads. The
    /// outcome is still reported to the health tracker.
    pub async fn run_once<T, F, Fut>(&self, class: HostClass, action: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let selector = self.selector(class);
        let once = RetryConfig {
            max_attempts: 1,
            ..self.retry
        };
        retry_with_hosts(
            &once,
            &self.health,
            || async move {
                let candidates = self.candidate_hosts().await?;
                selector.next_host(&candidates, &self.health)
            },
            action,
        )
        .await
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn queryer(&self) -> Option<&Arc<Queryer>> {
        self.queryer.as_ref()
    }

    /// Abort background discovery work
    pub fn shutdown(&self) {
        if let Some(queryer) = &self.queryer {
            queryer.shutdown();
        }
    }

    fn selector(&self, class: HostClass) -> &HostSelector {
        match class {
            HostClass::Download => &self.download,
            HostClass::Upload => &self.upload,
        }
    }
}

/// Builder for [`HostRouter`]
pub struct HostRouterBuilder {
    static_hosts: Vec<String>,
    identity: Identity,
    queryer: Option<Arc<Queryer>>,
    health: Option<Arc<HealthTracker>>,
    health_config: HealthConfig,
    retry: RetryConfig,
    probe_percent: u32,
}

impl HostRouterBuilder {
    pub fn new(static_hosts: Vec<String>) -> Self {
        Self {
            static_hosts,
            identity: Identity::new("", ""),
            queryer: None,
            health: None,
            health_config: HealthConfig::default(),
            retry: RetryConfig::default(),
            probe_percent: DEFAULT_PROBE_PERCENT,
        }
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn queryer(mut self, queryer: Arc<Queryer>) -> Self {
        self.queryer = Some(queryer);
        self
    }

    /// Share an existing health tracker instead of creating a new one
    pub fn health(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn health_config(mut self, config: HealthConfig) -> Self {
        self.health_config = config;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn probe_percent(mut self, percent: u32) -> Self {
        self.probe_percent = percent;
        self
    }

    pub fn build(self) -> HostRouter {
        HostRouter {
            static_hosts: self.static_hosts,
            identity: self.identity,
            queryer: self.queryer,
            health: self
                .health
                .unwrap_or_else(|| Arc::new(HealthTracker::new(self.health_config))),
            download: HostSelector::new(self.probe_percent),
            upload: HostSelector::new(self.probe_percent),
            retry: self.retry,
        }
    }
}

impl std::fmt::Debug for HostRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRouter")
            .field("static_hosts", &self.static_hosts)
            .field("identity", &self.identity)
            .field("discovery", &self.queryer.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}
