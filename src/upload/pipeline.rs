//! Upload validation and blob persistence

use std::future::Future;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::documents::PDF_CONTENT_TYPE;
use crate::error::{AppError, Result};
use crate::storage::BlobStore;

use super::types::{AcceptedUpload, UploadFields};

/// Validate a multipart upload
///
/// Exactly one `file` part is accepted; its declared content type must be
/// the PDF constant and its size must not exceed `max_bytes`. Sibling text
/// fields (`title`, `description`, `tags`, `isPublic`) are collected into
/// [`UploadFields`].
pub async fn accept(mut multipart: Multipart, max_bytes: u64) -> Result<AcceptedUpload> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut fields = UploadFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::Validation(
                        "Only one file per upload is allowed".to_string(),
                    ));
                }

                let content_type = field.content_type().unwrap_or_default().to_string();
                if content_type != PDF_CONTENT_TYPE {
                    return Err(AppError::UnsupportedMediaType(format!(
                        "Expected {}, got '{}'",
                        PDF_CONTENT_TYPE, content_type
                    )));
                }

                let original_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("document.pdf")
                    .to_string();

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;

                if data.len() as u64 > max_bytes {
                    return Err(AppError::PayloadTooLarge { max: max_bytes });
                }

                file = Some((original_name, data.to_vec()));
            }
            "title" => {
                fields.title = non_empty(field.text().await.unwrap_or_default());
            }
            "description" => {
                fields.description = non_empty(field.text().await.unwrap_or_default());
            }
            "tags" => {
                fields.tags = parse_tags(&field.text().await.unwrap_or_default());
            }
            "isPublic" => {
                fields.is_public = parse_bool_field(&field.text().await.unwrap_or_default());
            }
            _ => {}
        }
    }

    let (original_name, data) = file
        .ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    Ok(AcceptedUpload {
        storage_key: generate_storage_key(&original_name),
        size: data.len() as u64,
        original_name,
        data,
        fields,
    })
}

/// Write the blob, then run the metadata commit
///
/// If the commit fails after the blob is durably written, the orphaned blob
/// is deleted before the error surfaces. A failure of that compensating
/// delete is logged and does not mask the original error.
pub async fn store_then<T, F, Fut>(
    storage: &BlobStore,
    storage_key: &str,
    data: Vec<u8>,
    commit: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    storage.put_object(storage_key, data, PDF_CONTENT_TYPE).await?;

    match commit().await {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(
                storage_key = %storage_key,
                error = %e,
                "Metadata commit failed, removing orphaned blob"
            );
            if let Err(cleanup_err) = storage.delete_object(storage_key).await {
                tracing::error!(
                    storage_key = %storage_key,
                    "Failed to remove orphaned blob: {}",
                    cleanup_err
                );
            }
            Err(e)
        }
    }
}

/// Mint a unique storage key, preserving the original extension
pub fn generate_storage_key(original_name: &str) -> String {
    let extension = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "pdf".to_string());

    format!("documents/{}.{}", Uuid::new_v4(), extension)
}

/// Title to use when the form does not provide one: the file name without
/// its extension
pub fn default_title(original_name: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => original_name.to_string(),
    }
}

/// A body-limit overrun mid-read is still a 413; anything else about the
/// multipart stream is the client's formatting problem
fn multipart_error(error: MultipartError, max_bytes: u64) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { max: max_bytes }
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", error))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Only the literal strings "true" and "1" are true; everything else,
/// including an omitted field, is false
fn parse_bool_field(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BlobStore;

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key("paper.pdf");
        assert!(key.starts_with("documents/"));
        assert!(key.ends_with(".pdf"));
        assert_ne!(key, generate_storage_key("paper.pdf"));

        assert!(generate_storage_key("archive.tar.PDF").ends_with(".pdf"));
        // No usable extension falls back to pdf
        assert!(generate_storage_key("noext").ends_with(".pdf"));
        assert!(generate_storage_key("trailing.").ends_with(".pdf"));
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("thesis.pdf"), "thesis");
        assert_eq!(default_title("archive.tar.pdf"), "archive.tar");
        assert_eq!(default_title("noext"), "noext");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn test_parse_bool_field() {
        assert!(parse_bool_field("true"));
        assert!(parse_bool_field("1"));
        // The original server coerced any present value to true; only the
        // literal forms count here
        assert!(!parse_bool_field("false"));
        assert!(!parse_bool_field("yes"));
        assert!(!parse_bool_field(""));
    }

    #[tokio::test]
    async fn test_store_then_commits() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStore::with_local_storage(dir.path().to_path_buf());

        let result = store_then(&storage, "documents/ok.pdf", b"%PDF-1.4".to_vec(), || async {
            Ok(42)
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert!(storage.object_exists("documents/ok.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_then_removes_orphan_on_commit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStore::with_local_storage(dir.path().to_path_buf());

        // A 10 MiB blob whose metadata commit fails must not linger
        let data = vec![0u8; 10 * 1024 * 1024];
        let result: crate::error::Result<()> =
            store_then(&storage, "documents/orphan.pdf", data, || async {
                Err(crate::error::AppError::Internal("simulated".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(!storage.object_exists("documents/orphan.pdf").await.unwrap());
    }
}
