// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Remote (cold) tier over an S3-compatible object store

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Region used when none is configured; MinIO ignores it
pub const DEFAULT_REGION: &str = "us-east-1";

/// Remote storage configuration
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// S3 endpoint URL (MinIO, R2, AWS, ...)
    pub endpoint: String,

    pub bucket: String,

    pub access_key: String,

    pub secret_key: String,

    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl RemoteConfig {
    /// Build a config only when all four connection settings are present
    #[must_use]
    pub fn from_parts(
        endpoint: Option<String>,
        bucket: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
        region: Option<String>,
    ) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            endpoint: present(endpoint)?,
            bucket: present(bucket)?,
            access_key: present(access_key)?,
            secret_key: present(secret_key)?,
            region: present(region).unwrap_or_else(default_region),
        })
    }
}

/// Object storage used as the cold tier
///
/// Keys are `/`-separated paths relative to the local root.
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Check that the configured bucket is reachable
    async fn probe(&self) -> Result<()>;

    /// Stream the object at `key` into `dest`, returning the byte count
    ///
    /// A missing object is `Error::NotFound`.
    async fn fetch(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64>;

    /// Upload the local file at `source` as `key`, replacing any existing object
    async fn push(&self, key: &str, source: &Path) -> Result<()>;

    /// Short human readable description for logs
    fn describe(&self) -> String;
}

/// Probe with an upper bound on the time spent
pub async fn probe_remote(remote: &dyn RemoteStore, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, remote.probe()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::RemoteUnavailable(format!(
            "{}: {e}",
            remote.describe()
        ))),
        Err(_) => Err(Error::RemoteUnavailable(format!(
            "{}: no answer within {}s",
            remote.describe(),
            timeout.as_secs()
        ))),
    }
}

/// `RemoteStore` backed by an `object_store` implementation
#[derive(Debug)]
pub struct ObjectStoreRemote {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStoreRemote {
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Build a path-style S3 client for the configured endpoint and bucket
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_region(&config.region)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(true)
            .build()?;

        Ok(Self::new(
            Arc::new(store),
            format!("s3 {}/{}", config.endpoint, config.bucket),
        ))
    }

    fn object_path(key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key.trim_start_matches('/'))
            .map_err(|e| Error::internal(format!("invalid object key {key}: {e}")))
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn probe(&self) -> Result<()> {
        // Only the first listing page is requested
        let mut listing = self.store.list(None);
        match listing.next().await {
            None | Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn fetch(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let location = Self::object_path(key)?;
        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => Error::not_found(key),
            other => other.into(),
        })?;

        let mut stream = result.into_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            dest.write_all(&chunk)
                .await
                .map_err(|e| Error::internal(format!("writing fetched {key}: {e}")))?;
            total += chunk.len() as u64;
        }
        dest.flush()
            .await
            .map_err(|e| Error::internal(format!("writing fetched {key}: {e}")))?;
        Ok(total)
    }

    async fn push(&self, key: &str, source: &Path) -> Result<()> {
        let location = Self::object_path(key)?;
        let mut file = tokio::fs::File::open(source)
            .await
            .map_err(|e| Error::io(source, e))?;

        let mut writer = BufWriter::new(self.store.clone(), location);
        if let Err(e) = tokio::io::copy(&mut file, &mut writer).await {
            _ = writer.abort().await;
            return Err(Error::push_failed(key, e));
        }
        writer
            .shutdown()
            .await
            .map_err(|e| Error::push_failed(key, e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
