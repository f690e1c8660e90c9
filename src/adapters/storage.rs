//! Object storage client.
//!
//! Streams a remote object to local scratch storage without buffering the
//! whole payload in memory. Any transport or not-found condition is fatal for
//! the job; transient failures are handled by the queue's own redelivery.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Object storage collaborator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `bucket/key` to `dest` on local disk.
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

/// HTTP object-store client for S3-compatible endpoints
/// (`GET {endpoint}/{bucket}/{key}`, optional bearer token).
pub struct HttpObjectStore {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: String, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        // Encode each path segment of the key; slashes delimit segments.
        let encoded_key = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!("{}/{}/{}", self.endpoint, bucket, encoded_key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let url = self.object_url(bucket, key);

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request
            .send()
            .await
            .with_context(|| format!("Failed to request object {}/{}", bucket, key))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Object store returned {} for {}/{}",
                response.status(),
                bucket,
                key
            );
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written: u64 = 0;
        while let Some(bytes) = response
            .chunk()
            .await
            .context("Failed reading object body")?
        {
            file.write_all(&bytes)
                .await
                .context("Failed writing object to disk")?;
            written += bytes.len() as u64;
        }

        file.flush().await.context("Failed flushing object file")?;

        tracing::debug!(bucket, key, bytes = written, "Object downloaded");

        Ok(())
    }
}
