//! ns-http: operation clients for nodestore storage nodes
//!
//! A [`StorageClient`] hands out cheap handles for each group of operations:
//! - [`Downloader`]: whole, ranged, streamed and resumable downloads
//! - [`Uploader`]: bytes, files, streams and folder markers
//! - [`Modifier`]: delete, rename, metadata, prefix listing, links
//! - [`Bucketer`]: bucket create/delete/list/info
//!
//! [`StorageClient::check_hosts`] actively checks every candidate node.
//!
//! Every network call goes through the client's [`ns_core::HostRouter`], so
//! all handles share host health and retry policy. [`HttpDiscovery`] is the
//! HTTP transport for discovered host lists.

pub mod bucket;
pub mod check;
pub mod client;
pub mod download;
pub mod modify;
pub mod query;
pub mod types;
pub mod upload;

pub use bucket::Bucketer;
pub use check::HostStatus;
pub use client::{StorageClient, USER_AGENT};
pub use download::{ByteStream, Downloader};
pub use modify::Modifier;
pub use query::{DEFAULT_TTL, HttpDiscovery};
pub use types::{BucketInfo, BucketObject, ExternHeaders, MetaInfo, ObjectEntry, ObjectPage};
pub use upload::{LAST_BYTES_LEN, UploadOptions, Uploader};
