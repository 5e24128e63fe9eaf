//! Storage client
//!
//! Owns the HTTP client and the host router shared by the download,
//! upload, modify and bucket operation handles.

use std::sync::Arc;

use ns_core::{Config, Error, HostDiscovery, HostRouter, Result};
use reqwest::{Response, StatusCode};
use url::Url;

use crate::bucket::Bucketer;
use crate::download::Downloader;
use crate::modify::Modifier;
use crate::query::HttpDiscovery;
use crate::upload::Uploader;

/// User agent sent with every storage request
pub const USER_AGENT: &str = concat!("nodestore/", env!("CARGO_PKG_VERSION"));

/// State shared by every operation handle of one client
pub(crate) struct Shared {
    pub(crate) http: reqwest::Client,
    pub(crate) router: HostRouter,
    pub(crate) bucket: String,
    pub(crate) part_size: u64,
    pub(crate) https: bool,
}

/// Client for one bucket on a set of interchangeable storage nodes
///
/// Cloning is cheap; clones share health state, selection counters and the
/// discovery cache.
#[derive(Clone)]
pub struct StorageClient {
    pub(crate) shared: Arc<Shared>,
}

impl StorageClient {
    /// Create a client from configuration
    ///
    /// Discovery is enabled when `uc_hosts` is non-empty.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let discovery: Option<Arc<dyn HostDiscovery>> = if config.uc_hosts.is_empty() {
            None
        } else {
            Some(Arc::new(HttpDiscovery::new(config)?))
        };
        let router = HostRouter::from_config(config, discovery);
        Self::with_router(config, router)
    }

    /// Create a client around an existing router
    pub fn with_router(config: &Config, router: HostRouter) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            shared: Arc::new(Shared {
                http,
                router,
                bucket: config.bucket.clone(),
                part_size: config.part_size,
                https: config.https,
            }),
        })
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(self.shared.clone())
    }

    pub fn uploader(&self) -> Uploader {
        Uploader::new(self.shared.clone())
    }

    pub fn modifier(&self) -> Modifier {
        Modifier::new(self.shared.clone())
    }

    pub fn bucketer(&self) -> Bucketer {
        Bucketer::new(self.shared.clone())
    }

    pub fn router(&self) -> &HostRouter {
        &self.shared.router
    }

    pub fn bucket(&self) -> &str {
        &self.shared.bucket
    }

    /// Abort background discovery refreshes
    pub fn shutdown(&self) {
        self.shared.router.shutdown();
    }
}

impl Shared {
    /// Build `<scheme>://<host>/<segments...>[/<key>]`
    ///
    /// Hosts that already carry a scheme are used as-is. Key parts are
    /// percent-encoded per path segment so slashes in keys survive.
    pub(crate) fn url(&self, host: &str, segments: &[&str], key: Option<&str>) -> Result<Url> {
        let base = if host.contains("://") {
            host.to_string()
        } else if self.https {
            format!("https://{host}")
        } else {
            format!("http://{host}")
        };

        let mut url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid storage host {host}: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Storage host cannot be a base: {host}")))?;
            path.pop_if_empty().extend(segments);
            if let Some(key) = key {
                path.extend(normalize_key(key).split('/'));
            }
        }
        Ok(url)
    }

    /// URL of an object route: `/objects/<action>/<bucket>/<key>`
    pub(crate) fn object_url(&self, host: &str, action: &str, key: &str) -> Result<Url> {
        self.url(host, &["objects", action, self.bucket.as_str()], Some(key))
    }
}

/// Strip the leading slash callers sometimes put on object keys
pub(crate) fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// Map a transport error to a retryable network error
pub(crate) fn network_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Network(format!("Request timeout: {error}"))
    } else if error.is_connect() {
        Error::Network(format!("Connection failed: {error}"))
    } else if error.is_decode() {
        Error::Network(format!("Response decode failed: {error}"))
    } else {
        Error::Network(error.to_string())
    }
}

/// Accept only the listed statuses
///
/// 404 becomes [`Error::NotFound`] so it is not retried on another node;
/// anything else carries the response body as its message.
pub(crate) async fn expect_status(
    response: Response,
    accepted: &[StatusCode],
    what: &str,
) -> Result<Response> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(what.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body.trim().to_string()
    };
    Err(Error::status(status.as_u16(), message))
}
