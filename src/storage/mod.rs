//! Blob storage
//!
//! Stores document bytes under server-generated keys, outside the structured
//! database. Supports both S3-compatible object storage and a local
//! filesystem backend behind the same trait.

mod local;
mod s3;
mod types;

pub use local::LocalBlobStorage;
pub use s3::S3BlobStorage;
pub use types::*;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageProvider};
use crate::error::Result;

/// Trait for blob storage backends
#[async_trait::async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store a blob under a key; the blob is never observable under the key
    /// before the write completes
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch a blob's bytes
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Fetch blob metadata without the bytes
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata>;

    /// Delete a blob
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Check whether a blob exists
    async fn object_exists(&self, key: &str) -> Result<bool>;
}

/// Blob store handle with a pluggable backend
#[derive(Clone)]
pub struct BlobStore {
    inner: Arc<dyn BlobStorage>,
}

impl BlobStore {
    /// Create a store from configuration
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Local => Ok(Self::with_local_storage(PathBuf::from(
                &config.local_path,
            ))),
            _ => {
                let backend = S3BlobStorage::new(config).await?;
                Ok(Self {
                    inner: Arc::new(backend),
                })
            }
        }
    }

    /// Create with local filesystem storage
    pub fn with_local_storage(base_path: PathBuf) -> Self {
        Self {
            inner: Arc::new(LocalBlobStorage::new(base_path)),
        }
    }

    pub async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.inner.put_object(key, data, content_type).await
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.get_object(key).await
    }

    pub async fn head_object(&self, key: &str) -> Result<ObjectMetadata> {
        self.inner.head_object(key).await
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.inner.delete_object(key).await
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        self.inner.object_exists(key).await
    }
}
