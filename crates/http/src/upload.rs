//! Upload operations
//!
//! Everything lands on `PUT /objects/put/{bucket}/{key}`. The node reads the
//! `overwrite` and `blocksize` headers, and optionally `lastbytes`, the
//! base64 of the object's trailing bytes, which it uses to verify the tail.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures::Stream;
use ns_core::{Error, HostClass, Result};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue};
use reqwest::{Body, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::client::{Shared, expect_status, network_error};

/// Number of trailing bytes sent in the `lastbytes` header
pub const LAST_BYTES_LEN: usize = 32;

/// Per-upload flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing object with the same key
    pub overwrite: bool,
    /// Send the trailing bytes so the node can check the stored tail
    pub last_bytes: bool,
}

impl UploadOptions {
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn with_last_bytes(mut self) -> Self {
        self.last_bytes = true;
        self
    }
}

/// Upload handle for the client's bucket
#[derive(Clone)]
pub struct Uploader {
    shared: Arc<Shared>,
}

impl Uploader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Upload an in-memory object
    pub async fn upload_bytes(&self, key: &str, data: Bytes, options: UploadOptions) -> Result<()> {
        let mut headers = self.headers(options.overwrite);
        if options.last_bytes && data.len() > LAST_BYTES_LEN {
            insert_last_bytes(&mut headers, &data[data.len() - LAST_BYTES_LEN..])?;
        }

        let headers = &headers;
        let data = &data;
        self.shared
            .router
            .run(HostClass::Upload, |host| async move {
                self.put(&host, key, headers.clone(), Body::from(data.clone()))
                    .await
            })
            .await?;
        tracing::debug!(key = %key, size = data.len(), "Uploaded bytes");
        Ok(())
    }

    /// Upload a local file
    ///
    /// The file is reopened on every attempt so a retry sends it from the
    /// start.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        options: UploadOptions,
    ) -> Result<u64> {
        let path = path.as_ref();
        let mut headers = self.headers(options.overwrite);
        let size = tokio::fs::metadata(path).await?.len();
        if options.last_bytes && size > LAST_BYTES_LEN as u64 {
            let tail = read_tail(path).await?;
            insert_last_bytes(&mut headers, &tail)?;
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));

        let headers = &headers;
        self.shared
            .router
            .run(HostClass::Upload, |host| async move {
                let file = tokio::fs::File::open(path).await?;
                self.put(&host, key, headers.clone(), Body::from(file)).await
            })
            .await?;
        tracing::debug!(key = %key, path = %path.display(), size = size, "Uploaded file");
        Ok(size)
    }

    /// Upload from a stream of `size` bytes
    ///
    /// A stream cannot be replayed, so this makes exactly one attempt. When
    /// `last_bytes` is given it is sent as the tail header; at most the last
    /// [`LAST_BYTES_LEN`] bytes of it are used.
    pub async fn upload_stream<S>(
        &self,
        key: &str,
        stream: S,
        size: u64,
        options: UploadOptions,
        last_bytes: Option<&[u8]>,
    ) -> Result<()>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        let mut headers = self.headers(options.overwrite);
        if options.last_bytes
            && let Some(tail) = last_bytes
        {
            let start = tail.len().saturating_sub(LAST_BYTES_LEN);
            insert_last_bytes(&mut headers, &tail[start..])?;
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));

        let mut body = Some(Body::wrap_stream(stream));
        let headers = &headers;
        self.shared
            .router
            .run_once(HostClass::Upload, |host| {
                let body = body.take();
                async move {
                    let body = body.ok_or_else(|| {
                        Error::InvalidArgument("upload stream already consumed".to_string())
                    })?;
                    self.put(&host, key, headers.clone(), body).await
                }
            })
            .await?;
        tracing::debug!(key = %key, size = size, "Uploaded stream");
        Ok(())
    }

    /// Create a folder marker object
    pub async fn upload_folder(&self, key: &str, data: Bytes, overwrite: bool) -> Result<()> {
        let mut headers = self.headers(overwrite);
        headers.insert("floder", header_value(key)?);

        let headers = &headers;
        let data = &data;
        self.shared
            .router
            .run(HostClass::Upload, |host| async move {
                self.put(&host, key, headers.clone(), Body::from(data.clone()))
                    .await
            })
            .await
    }

    fn headers(&self, overwrite: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("overwrite", HeaderValue::from_static(bool_str(overwrite)));
        headers.insert("blocksize", HeaderValue::from(self.shared.part_size));
        headers
    }

    async fn put(&self, host: &str, key: &str, headers: HeaderMap, body: Body) -> Result<()> {
        let shared = &self.shared;
        let url = shared.object_url(host, "put", key)?;
        let response = shared
            .http
            .put(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(network_error)?;
        let response = expect_status(response, &[StatusCode::OK], key).await?;

        // Drain so the connection can be reused
        if let Err(e) = response.bytes().await {
            tracing::debug!(key = %key, error = %e, "Failed to drain upload response");
        }
        Ok(())
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("Invalid header value {value:?}: {e}")))
}

fn insert_last_bytes(headers: &mut HeaderMap, tail: &[u8]) -> Result<()> {
    headers.insert("lastbytes", header_value(&STANDARD.encode(tail))?);
    Ok(())
}

async fn read_tail(path: &Path) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::End(-(LAST_BYTES_LEN as i64)))
        .await?;
    let mut tail = vec![0u8; LAST_BYTES_LEN];
    file.read_exact(&mut tail).await?;
    Ok(tail)
}
