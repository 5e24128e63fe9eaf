//! On-disk persistence for the discovery cache
//!
//! The whole cache is rewritten on every persist. Only one persist runs at
//! a time; a concurrent attempt returns immediately without writing, since
//! the in-memory cache stays authoritative and the next persist carries
//! the missed update.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cached host list for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntry {
    pub hosts: Vec<String>,
    pub expires_at: Timestamp,
}

impl DiscoveryEntry {
    pub fn new(hosts: Vec<String>, expires_at: Timestamp) -> Self {
        Self { hosts, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Timestamp::now()
    }
}

/// File-backed store for the discovery cache map
#[derive(Debug, Default)]
pub struct CacheStore {
    path: Option<PathBuf>,
    persisting: AtomicBool,
}

impl CacheStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            persisting: AtomicBool::new(false),
        }
    }

    /// Store that never touches the disk
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the persisted map; a missing file yields an empty map
    pub fn load(&self) -> Result<HashMap<String, DiscoveryEntry>> {
        let Some(path) = &self.path else {
            return Ok(HashMap::new());
        };

        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(serde_json::from_slice(&raw)?)
    }

    /// Rewrite the persisted map
    ///
    /// Returns `Ok(false)` when another persist was already running and this
    /// one was dropped.
    pub async fn persist(&self, entries: &BTreeMap<String, DiscoveryEntry>) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(true);
        };

        if self
            .persisting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(path = %path.display(), "Cache persist already running, skipping");
            return Ok(false);
        }
        let _guard = PersistGuard(&self.persisting);

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            match tokio::fs::metadata(dir).await {
                Ok(meta) if !meta.is_dir() => {
                    return Err(Error::General(format!(
                        "Cache directory path is occupied and not a directory: {}",
                        dir.display()
                    )));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tokio::fs::create_dir_all(dir).await?;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        let bytes = serde_json::to_vec(entries)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), entries = entries.len(), "Persisted discovery cache");
        Ok(true)
    }
}

/// Clears the persisting flag when a persist finishes or is cancelled
struct PersistGuard<'a>(&'a AtomicBool);

impl Drop for PersistGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn far_future() -> Timestamp {
        "2100-01-01T00:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("query-cache.json");
        let store = CacheStore::new(&path);

        let mut entries = BTreeMap::new();
        entries.insert(
            "bucketA".to_string(),
            DiscoveryEntry::new(vec!["h1".to_string(), "h2".to_string()], far_future()),
        );
        entries.insert(
            "bucketB".to_string(),
            DiscoveryEntry::new(vec!["h3".to_string()], far_future()),
        );

        assert!(store.persist(&entries).await.unwrap());

        // A fresh store instance stands in for a restarted process
        let reloaded = CacheStore::new(&path).load().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded["bucketA"], entries["bucketA"]);
        assert_eq!(reloaded["bucketB"], entries["bucketB"]);
    }

    #[tokio::test]
    async fn test_wire_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query-cache.json");
        let store = CacheStore::new(&path);

        let mut entries = BTreeMap::new();
        entries.insert(
            "photos:ak".to_string(),
            DiscoveryEntry::new(vec!["10.0.0.1:9000".to_string()], far_future()),
        );
        store.persist(&entries).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["photos:ak"]["hosts"][0], "10.0.0.1:9000");
        assert_eq!(json["photos:ak"]["expiresAt"], "2100-01-01T00:00:00Z");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query-cache.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(CacheStore::new(&path).load(), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_concurrent_persist_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query-cache.json");
        let store = CacheStore::new(&path);

        // Simulate a persist that is still in progress
        store.persisting.store(true, Ordering::Release);
        assert!(!store.persist(&BTreeMap::new()).await.unwrap());
        assert!(!path.exists());

        store.persisting.store(false, Ordering::Release);
        assert!(store.persist(&BTreeMap::new()).await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_disabled_store() {
        let store = CacheStore::disabled();
        assert!(store.path().is_none());
        assert!(store.load().unwrap().is_empty());
        assert!(store.persist(&BTreeMap::new()).await.unwrap());
    }
}
