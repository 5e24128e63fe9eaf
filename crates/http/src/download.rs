//! Download operations
//!
//! Whole-object, ranged, streamed and resumable file downloads from
//! `/objects/getfile/{bucket}/{key}`.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use ns_core::{ByteRange, Error, HostClass, Result, parse_total_size};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_RANGE, HeaderMap, RANGE};
use tokio::io::AsyncWriteExt;

use crate::client::{Shared, expect_status, network_error, normalize_key};
use crate::types::MetaInfo;

/// Stream of body chunks from a ranged download
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Download handle for the client's bucket
#[derive(Clone)]
pub struct Downloader {
    shared: Arc<Shared>,
}

impl Downloader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Download a whole object into memory
    pub async fn download_bytes(&self, key: &str) -> Result<Bytes> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.object_url(&host, "getfile", key)?;
                let response = shared.http.get(url).send().await.map_err(network_error)?;
                let response = expect_status(response, &[StatusCode::OK], key).await?;
                response.bytes().await.map_err(network_error)
            })
            .await
    }

    /// Download an object into a local file, resuming a partial file
    ///
    /// Existing content is kept and only the missing tail is requested. A
    /// 416 answer means the file is already complete. Returns the final
    /// file length.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> Result<u64> {
        let shared = &self.shared;
        let path = path.as_ref();
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                let existing = file.metadata().await?.len();

                let url = shared.object_url(&host, "getfile", key)?;
                let mut request = shared.http.get(url).header(ACCEPT_ENCODING, "identity");
                if existing > 0 {
                    tracing::debug!(key = %key, offset = existing, "Resuming download");
                    request = request.header(RANGE, ByteRange::From(existing).header_value());
                }

                let response = request.send().await.map_err(network_error)?;
                if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
                    return Ok(existing);
                }
                let mut response = expect_status(
                    response,
                    &[StatusCode::OK, StatusCode::PARTIAL_CONTENT],
                    key,
                )
                .await?;

                // A node that ignores the range sends the whole object again
                if response.status() == StatusCode::OK && existing > 0 {
                    file.set_len(0).await?;
                }

                let expected = response.content_length();
                let mut written = 0u64;
                while let Some(chunk) = response.chunk().await.map_err(network_error)? {
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                file.flush().await?;

                if let Some(expected) = expected
                    && expected != written
                {
                    tracing::warn!(
                        key = %key,
                        expected = expected,
                        written = written,
                        "Download length mismatch"
                    );
                }

                Ok(file.metadata().await?.len())
            })
            .await
    }

    /// Download a byte range into memory
    ///
    /// Returns the total object size and the range body.
    pub async fn download_range(&self, key: &str, range: ByteRange) -> Result<(u64, Bytes)> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let response = self.request_range(&host, key, range).await?;
                let total = total_size(&response)?;
                let body = response.bytes().await.map_err(network_error)?;
                Ok((total, body))
            })
            .await
    }

    /// Start a ranged download and return its body as a stream
    ///
    /// Only establishing the response is retried; a stream interrupted
    /// midway ends with an error the caller must handle.
    pub async fn download_range_stream(
        &self,
        key: &str,
        range: ByteRange,
    ) -> Result<(u64, ByteStream)> {
        self.shared
            .router
            .run(HostClass::Download, |host| async move {
                let response = self.request_range(&host, key, range).await?;
                let total = total_size(&response)?;
                let stream = response
                    .bytes_stream()
                    .map(move |chunk| {
                        chunk.map_err(|e| {
                            tracing::info!(host = %host, error = %e, "Read interrupted");
                            network_error(e)
                        })
                    })
                    .boxed();
                Ok((total, stream))
            })
            .await
    }

    /// Send a GET with caller-provided headers and return the raw response
    ///
    /// Any HTTP status counts as success; only transport failures retry.
    pub async fn download_raw(&self, key: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        let shared = &self.shared;
        let headers = &headers;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.object_url(&host, "getfile", key)?;
                shared
                    .http
                    .get(url)
                    .headers(headers.clone())
                    .send()
                    .await
                    .map_err(network_error)
            })
            .await
    }

    /// Whether an object exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.object_url(&host, "getfile", key)?;
                let response = shared
                    .http
                    .head(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                match response.status() {
                    StatusCode::OK => Ok(true),
                    StatusCode::NOT_FOUND => Ok(false),
                    status => Err(Error::status(
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("unknown status"),
                    )),
                }
            })
            .await
    }

    /// Size of an object according to its metadata
    pub async fn file_size(&self, key: &str) -> Result<u64> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let meta = fetch_meta(shared, &host, key).await?;
                Ok(meta.size)
            })
            .await
    }

    async fn request_range(
        &self,
        host: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<reqwest::Response> {
        let shared = &self.shared;
        let url = shared.object_url(host, "getfile", key)?;
        let response = shared
            .http
            .get(url)
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(network_error)?;
        expect_status(response, &[StatusCode::PARTIAL_CONTENT], key).await
    }
}

/// Fetch object metadata from one host
pub(crate) async fn fetch_meta(shared: &Shared, host: &str, key: &str) -> Result<MetaInfo> {
    let url = shared.url(host, &["objects", "metadetail"], None)?;
    let response = shared
        .http
        .get(url)
        .header("bucket", &shared.bucket)
        .header("object", normalize_key(key))
        .send()
        .await
        .map_err(network_error)?;
    let response = expect_status(response, &[StatusCode::OK], key).await?;
    let body = response.bytes().await.map_err(network_error)?;
    let meta: MetaInfo = serde_json::from_slice(&body)?;
    Ok(meta.normalize())
}

fn total_size(response: &reqwest::Response) -> Result<u64> {
    let value = response
        .headers()
        .get(CONTENT_RANGE)
        .ok_or_else(|| Error::Range("no content range".to_string()))?
        .to_str()
        .map_err(|e| Error::Range(format!("unreadable content range: {e}")))?;
    parse_total_size(value)
}
