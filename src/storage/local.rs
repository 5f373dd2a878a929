//! Local filesystem storage backend
//!
//! Blob keys resolve to paths under a base directory. Writes go to a
//! temporary sibling first and are renamed into place, so a partially
//! written blob is never visible under its final key.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, StorageError};

use super::types::ObjectMetadata;
use super::BlobStorage;

/// Filesystem blob storage rooted at a base directory
pub struct LocalBlobStorage {
    base_path: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a key to its path; keys are server-generated, but anything
    /// that would escape the base directory is rejected outright
    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || Path::new(key).is_absolute()
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(StorageError::LocalIo(format!("Invalid object key: {}", key)).into());
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait::async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::LocalIo(e.to_string()))?;
        }

        // Write-then-rename keeps the final key atomic
        let tmp_path = path.with_extension(format!("part-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp_path, &data)
            .await
            .map_err(|e| StorageError::LocalIo(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StorageError::LocalIo(e.to_string()))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(key.to_string()).into())
            }
            Err(e) => Err(StorageError::LocalIo(e.to_string()).into()),
        }
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata> {
        let path = self.blob_path(key)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(key.to_string()).into());
            }
            Err(e) => return Err(StorageError::LocalIo(e.to_string()).into()),
        };

        let last_modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t));

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: metadata.len() as i64,
            content_type: None,
            last_modified,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(key.to_string()).into())
            }
            Err(e) => Err(StorageError::LocalIo(e.to_string()).into()),
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let path = self.blob_path(key)?;
        Ok(tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::LocalIo(e.to_string()))?)
    }
}
