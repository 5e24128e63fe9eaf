//! ns-core: Host resilience core for the nodestore client
//!
//! This crate decides which storage node every request goes to:
//! - Passive health tracking per node address
//! - Round-robin host selection that skips unhealthy nodes
//! - A persisted, TTL-bounded discovery cache per (account, bucket)
//! - Bounded retries that feed outcomes back into health tracking
//! - Byte-range header helpers for partial reads
//!
//! It is independent of any HTTP client; the operation clients live in
//! `ns-http` and reach nodes only through [`HostRouter::run`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod range;
pub mod retry;
pub mod router;
pub mod selector;
pub mod store;

pub use config::{CONFIG_ENV, Config};
pub use discovery::{COLD_FAILURE_WINDOW, Discovered, HostDiscovery, Identity, Queryer};
pub use error::{Error, Result};
pub use health::{HealthConfig, HealthTracker, HostHealth};
pub use range::{ByteRange, FROM_END, parse_total_size};
pub use retry::{RetryBuilder, RetryConfig, retry_with_hosts};
pub use router::{HostClass, HostRouter, HostRouterBuilder};
pub use selector::{DEFAULT_PROBE_PERCENT, HostSelector};
pub use store::{CacheStore, DiscoveryEntry};
