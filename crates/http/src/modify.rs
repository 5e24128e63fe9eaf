//! Object management: delete, rename, metadata, prefix listing and links

use std::sync::Arc;

use ns_core::{HostClass, Result};
use reqwest::StatusCode;
use reqwest::header::ACCEPT_ENCODING;

use crate::client::{Shared, expect_status, network_error};
use crate::download::fetch_meta;
use crate::types::{MetaInfo, ObjectPage};

/// Object management handle for the client's bucket
#[derive(Clone)]
pub struct Modifier {
    shared: Arc<Shared>,
}

impl Modifier {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub async fn delete_file(&self, key: &str) -> Result<()> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.object_url(&host, "deletefile", key)?;
                let response = shared
                    .http
                    .delete(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .send()
                    .await
                    .map_err(network_error)?;
                expect_status(response, &[StatusCode::OK], key).await?;
                Ok(())
            })
            .await?;
        tracing::debug!(key = %key, "Deleted object");
        Ok(())
    }

    /// Rename `key` to `new_name` within the bucket
    pub async fn rename_file(&self, key: &str, new_name: &str) -> Result<()> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.object_url(&host, "rename", key)?;
                let response = shared
                    .http
                    .put(url)
                    .header(ACCEPT_ENCODING, "identity")
                    .header("newname", new_name)
                    .send()
                    .await
                    .map_err(network_error)?;
                expect_status(response, &[StatusCode::OK], key).await?;
                Ok(())
            })
            .await?;
        tracing::debug!(key = %key, new_name = %new_name, "Renamed object");
        Ok(())
    }

    pub async fn meta_info(&self, key: &str) -> Result<MetaInfo> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                fetch_meta(shared, &host, key).await
            })
            .await
    }

    /// List up to `limit` objects whose names start with `prefix`
    pub async fn list_objects(&self, prefix: &str, limit: usize) -> Result<ObjectPage> {
        let shared = &self.shared;
        shared
            .router
            .run(HostClass::Download, |host| async move {
                let url = shared.url(
                    &host,
                    &["objects", "listobject", shared.bucket.as_str()],
                    None,
                )?;
                let response = shared
                    .http
                    .get(url)
                    .header("Prefix", prefix)
                    .header("size", limit.to_string())
                    .send()
                    .await
                    .map_err(network_error)?;
                let response = expect_status(response, &[StatusCode::OK], &shared.bucket).await?;
                let body = response.bytes().await.map_err(network_error)?;
                Ok(serde_json::from_slice::<ObjectPage>(&body)?)
            })
            .await
    }

    /// Public download URL of `key` on a selected node
    ///
    /// Nothing is sent to the node; only host discovery may do I/O.
    pub async fn link(&self, key: &str) -> Result<String> {
        let host = self.shared.router.next_host(HostClass::Download).await?;
        Ok(self.shared.object_url(&host, "getfile", key)?.to_string())
    }
}
