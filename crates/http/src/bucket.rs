//! Bucket administration
//!
//! Unlike the other handles these take the bucket name per call, so one
//! client can manage buckets other than its own.

use std::sync::Arc;

use ns_core::{Error, HostClass, Result};
use reqwest::StatusCode;
use reqwest::header::ACCEPT_ENCODING;

use crate::client::{Shared, expect_status, network_error};
use crate::types::{BucketInfo, BucketObject};

#[derive(Clone)]
pub struct Bucketer {
    shared: Arc<Shared>,
}

impl Bucketer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub async fn make_bucket(&self, name: &str) -> Result<()> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(&host, &["objects", "makebucket", name], None)?;
                let response = shared
                    .http
                    .put(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                expect_status(response, &[StatusCode::OK], name).await?;
                Ok(())
            })
            .await?;
        tracing::info!(bucket = %name, "Created bucket");
        Ok(())
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(&host, &["objects", "deletebucket", name], None)?;
                let response = shared
                    .http
                    .delete(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                expect_status(response, &[StatusCode::OK], name).await?;
                Ok(())
            })
            .await?;
        tracing::info!(bucket = %name, "Deleted bucket");
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(&host, &["objects", "listbucket"], None)?;
                let response = shared
                    .http
                    .get(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                let response = expect_status(response, &[StatusCode::OK], "buckets").await?;
                let body = response.bytes().await.map_err(network_error)?;
                Ok(serde_json::from_slice::<Vec<BucketInfo>>(&body)?)
            })
            .await
    }

    /// Whether a bucket exists (HEAD on its info route)
    pub async fn bucket_exists(&self, name: &str) -> Result<bool> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(&host, &["objects", "getbucket", name], None)?;
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

    /// Every object record stored in a bucket
    pub async fn list_bucket_objects(&self, name: &str) -> Result<Vec<BucketObject>> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(&host, &["objects", "listobject", name], None)?;
                let response = shared
                    .http
                    .get(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                let response = expect_status(response, &[StatusCode::OK], name).await?;
                let body = response.bytes().await.map_err(network_error)?;
                Ok(serde_json::from_slice::<Vec<BucketObject>>(&body)?)
            })
            .await
    }
}
