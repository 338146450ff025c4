//! Bucket access for the ingestion pipeline.
//!
//! The pipeline only sees [`ObjectStore`]; [`S3ObjectStore`] is the
//! production implementation and works against AWS S3 or any S3-compatible
//! endpoint (R2, MinIO) when `endpoint_url` is configured.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client as S3Client, config::Region, error::DisplayErrorContext};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op} `{key}` failed: {detail}")]
    Request {
        op: &'static str,
        key: String,
        detail: String,
    },
}

impl StorageError {
    fn request(op: &'static str, key: &str, detail: impl Into<String>) -> Self {
        Self::Request {
            op,
            key: key.to_string(),
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys under `prefix`, in the order the store returns them.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Credentials come from the default AWS provider chain.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self {
            client: S3Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| {
                    StorageError::request("list", prefix, DisplayErrorContext(&err).to_string())
                })?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        debug!(target: "sync.storage", bucket, prefix, count = keys.len(), "objects_listed");
        Ok(keys)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StorageError::request("get", key, DisplayErrorContext(&err).to_string()))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|err| StorageError::request("get", key, err.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError> {
        let source = format!("{bucket}/{}", urlencoding::encode(from));
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(source)
            .key(to)
            .send()
            .await
            .map_err(|err| StorageError::request("copy", from, DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                StorageError::request("delete", key, DisplayErrorContext(&err).to_string())
            })?;
        Ok(())
    }
}
