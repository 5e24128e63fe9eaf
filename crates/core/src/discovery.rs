//! Discovery cache for storage host lists
//!
//! Host lists are discovered per identity (account + bucket) and cached
//! with a TTL:
//!
//! - **Cold**: the first caller takes the refresh lock, re-checks, fetches
//!   and installs. Concurrent first callers wait on the same lock and find
//!   the installed entry instead of fetching again. A failed cold fetch is
//!   remembered for a short window, so waiters and immediate retries get the
//!   same error without asking the discovery service again.
//! - **Fresh**: served from memory.
//! - **Expired**: the stale list is served immediately while a single
//!   background refresh replaces it. A failed refresh leaves the stale list
//!   in place.
//!
//! Every install rewrites the persisted cache so a restarted process starts
//! warm.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::store::{CacheStore, DiscoveryEntry};

/// How long a failed cold fetch is answered from memory
pub const COLD_FAILURE_WINDOW: Duration = Duration::from_secs(5);

/// Storage identity used as the discovery cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub account: String,
    pub bucket: String,
}

impl Identity {
    pub fn new(account: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            bucket: bucket.into(),
        }
    }

    /// Key under which the identity is cached and persisted
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.bucket, self.account)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// Result of one discovery call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub hosts: Vec<String>,
    pub ttl: Duration,
}

/// Transport that fetches the current host list for an identity
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostDiscovery: Send + Sync {
    async fn fetch_hosts(&self, identity: &Identity) -> Result<Discovered>;
}

/// TTL-bounded, persisted cache of discovered host lists
///
/// Background refreshes belong to the queryer; [`Queryer::shutdown`] or
/// dropping the queryer aborts any that are still running.
pub struct Queryer {
    inner: Arc<Inner>,
    tasks: Mutex<JoinSet<()>>,
}

struct Inner {
    transport: Arc<dyn HostDiscovery>,
    entries: RwLock<HashMap<String, Arc<DiscoveryEntry>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    refreshing: Mutex<HashSet<String>>,
    /// Last cold failure per key; only read and written under `refresh_lock`
    failures: Mutex<HashMap<String, ColdFailure>>,
    failure_window: Duration,
    store: CacheStore,
}

struct ColdFailure {
    message: String,
    at: Instant,
}

impl Queryer {
    /// Create a queryer, loading any previously persisted entries
    pub fn new(transport: Arc<dyn HostDiscovery>, store: CacheStore) -> Self {
        Self::with_failure_window(transport, store, COLD_FAILURE_WINDOW)
    }

    /// Like [`Queryer::new`], remembering cold failures for `failure_window`
    pub fn with_failure_window(
        transport: Arc<dyn HostDiscovery>,
        store: CacheStore,
        failure_window: Duration,
    ) -> Self {
        let entries = match store.load() {
            Ok(loaded) => loaded
                .into_iter()
                .map(|(key, entry)| (key, Arc::new(entry)))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    path = ?store.path(),
                    error = %e,
                    "Ignoring unreadable discovery cache"
                );
                HashMap::new()
            }
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                entries: RwLock::new(entries),
                refresh_lock: tokio::sync::Mutex::new(()),
                refreshing: Mutex::new(HashSet::new()),
                failures: Mutex::new(HashMap::new()),
                failure_window,
                store,
            }),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Current host list for `identity`
    ///
    /// An empty list means discovery has nothing for this identity and the
    /// caller should use its static hosts.
    pub async fn query_hosts(&self, identity: &Identity) -> Result<Vec<String>> {
        let key = identity.cache_key();

        if let Some(entry) = self.inner.get(&key) {
            if entry.is_expired() {
                self.spawn_refresh(identity.clone(), key);
            }
            return Ok(entry.hosts.clone());
        }

        self.cold_query(identity, &key).await
    }

    /// Cached entry for `identity`, if any
    pub fn cached(&self, identity: &Identity) -> Option<DiscoveryEntry> {
        self.inner.get(&identity.cache_key()).map(|e| (*e).clone())
    }

    /// Abort in-flight background refreshes
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            tracing::debug!(tasks = tasks.len(), "Aborting background discovery refreshes");
        }
        tasks.abort_all();
    }

    /// Wait for every background refresh started so far to finish
    pub async fn join_refreshes(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while tasks.join_next().await.is_some() {}
    }

    async fn cold_query(&self, identity: &Identity, key: &str) -> Result<Vec<String>> {
        let entry = {
            let _lock = self.inner.refresh_lock.lock().await;
            if let Some(entry) = self.inner.get(key) {
                return Ok(entry.hosts.clone());
            }
            if let Some(message) = self.inner.recent_failure(key) {
                tracing::debug!(identity = %identity, "Reusing recent discovery failure");
                return Err(Error::Discovery(message));
            }

            match self.inner.transport.fetch_hosts(identity).await {
                Ok(discovered) => {
                    self.inner.clear_failure(key);
                    self.inner.install(key, discovered)
                }
                Err(e) => {
                    let message = match e {
                        Error::Discovery(message) => message,
                        other => format!("{identity}: {other}"),
                    };
                    self.inner.record_failure(key, &message);
                    return Err(Error::Discovery(message));
                }
            }
        };

        self.inner.persist().await;
        Ok(entry.hosts.clone())
    }

    fn spawn_refresh(&self, identity: Identity, key: String) {
        {
            let mut refreshing = self
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        // The marker moves into the task so it is released even if the task
        // is aborted before its first poll.
        let marker = RefreshMarker {
            inner: self.inner.clone(),
            key,
        };
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let marker = marker;
            marker.inner.refresh(&identity, &marker.key).await;
        });
    }
}

impl Drop for Queryer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn get(&self, key: &str) -> Option<Arc<DiscoveryEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn recent_failure(&self, key: &str) -> Option<String> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures
            .get(key)
            .filter(|failure| failure.at.elapsed() < self.failure_window)
            .map(|failure| failure.message.clone())
    }

    fn record_failure(&self, key: &str, message: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                ColdFailure {
                    message: message.to_string(),
                    at: Instant::now(),
                },
            );
    }

    fn clear_failure(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn install(&self, key: &str, discovered: Discovered) -> Arc<DiscoveryEntry> {
        let expires_at = Timestamp::now()
            .checked_add(discovered.ttl)
            .unwrap_or(Timestamp::MAX);
        let entry = Arc::new(DiscoveryEntry::new(discovered.hosts, expires_at));

        tracing::info!(
            identity = %key,
            hosts = entry.hosts.len(),
            expires_at = %entry.expires_at,
            "Installed discovered hosts"
        );

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry.clone());
        entry
    }

    async fn refresh(&self, identity: &Identity, key: &str) {
        {
            let _lock = self.refresh_lock.lock().await;
            if let Some(entry) = self.get(key)
                && !entry.is_expired()
            {
                return;
            }

            match self.transport.fetch_hosts(identity).await {
                Ok(discovered) => {
                    self.install(key, discovered);
                }
                Err(e) => {
                    tracing::warn!(
                        identity = %identity,
                        error = %e,
                        "Background discovery refresh failed, keeping stale hosts"
                    );
                    return;
                }
            }
        }

        self.persist().await;
    }

    async fn persist(&self) {
        let snapshot: BTreeMap<String, DiscoveryEntry> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, entry)| (key.clone(), (**entry).clone()))
            .collect();

        if let Err(e) = self.store.persist(&snapshot).await {
            tracing::warn!(
                path = ?self.store.path(),
                error = %e,
                "Failed to persist discovery cache"
            );
        }
    }
}

/// Clears the in-flight mark for a key when its refresh ends or is aborted
struct RefreshMarker {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for RefreshMarker {
    fn drop(&mut self) {
        self.inner
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
