//! Document endpoints
//!
//! Upload, listing, detail with nested visible annotations, file download,
//! update, and cascade delete.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::annotations::{Annotation, AnnotationFilter, AnnotationRepository};
use crate::auth::{CurrentUser, MaybeUser};
use crate::documents::{
    validate_description, validate_tags, validate_title, Document, DocumentFilter,
    DocumentPatch, DocumentRepository, PDF_CONTENT_TYPE,
};
use crate::error::{AppError, Result};
use crate::policy;
use crate::state::AppState;
use crate::upload;

use super::{normalize_paging, ApiResponse, Empty, PageEnvelope};

/// Create the documents router
pub fn router(max_upload_bytes: u64) -> Router<AppState> {
    // Leave the body limit some headroom over the file cap so the pipeline
    // rejects oversized files with a proper envelope instead of the framework
    // cutting the body off first
    let body_limit = (max_upload_bytes as usize).saturating_add(1024 * 1024);

    Router::new()
        .route("/", get(list_my_documents).post(upload_document))
        .route("/public", get(list_public_documents))
        .route(
            "/:id",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/:id/file", get(download_document))
        .layer(DefaultBodyLimit::max(body_limit))
}

#[derive(Debug, Deserialize)]
pub struct DocumentListParams {
    pub search: Option<String>,
    /// Comma-separated tag list
    pub tags: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl DocumentListParams {
    fn filter(&self) -> DocumentFilter {
        DocumentFilter {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            tags: self
                .tags
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentData {
    pub document: Document,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetailData {
    pub document: Document,
    /// Annotations the viewer is allowed to see, newest first
    pub annotations: Vec<Annotation>,
    pub annotation_count: usize,
}

/// POST /api/v1/documents
///
/// Multipart upload: one `file` part plus optional `title`, `description`,
/// `tags`, and `isPublic` fields.
async fn upload_document(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<DocumentData>>)> {
    let accepted = upload::accept(multipart, state.config().upload.max_file_size).await?;

    let title = accepted
        .fields
        .title
        .clone()
        .unwrap_or_else(|| upload::default_title(&accepted.original_name));

    let document = Document::new(
        &title,
        &accepted.storage_key,
        &accepted.original_name,
        accepted.size as i64,
        &identity.user_id,
    )
    .with_description(accepted.fields.description.clone())
    .with_tags(accepted.fields.tags.clone())
    .with_visibility(accepted.fields.is_public);
    document.validate()?;

    let repo = DocumentRepository::new(state.db());
    let storage_key = accepted.storage_key.clone();
    upload::store_then(state.storage(), &storage_key, accepted.data, || async {
        repo.insert(&document).await
    })
    .await?;

    tracing::info!(
        document_id = %document.id,
        owner_id = %identity.user_id,
        file_name = %document.file_name,
        size = document.file_size,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, ApiResponse::ok(DocumentData { document })))
}

/// GET /api/v1/documents
async fn list_my_documents(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(params): Query<DocumentListParams>,
) -> Result<Json<ApiResponse<PageEnvelope<Document>>>> {
    let (page, limit) = normalize_paging(params.page, params.limit);
    let filter = params.filter();

    let (items, total) = DocumentRepository::new(state.db())
        .list_owned(&identity.user_id, &filter, page, limit)
        .await?;

    Ok(ApiResponse::ok(PageEnvelope::new(items, total, page, limit)))
}

/// GET /api/v1/documents/public
async fn list_public_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListParams>,
) -> Result<Json<ApiResponse<PageEnvelope<Document>>>> {
    let (page, limit) = normalize_paging(params.page, params.limit);
    let filter = params.filter();

    let (items, total) = DocumentRepository::new(state.db())
        .list_public(&filter, page, limit)
        .await?;

    Ok(ApiResponse::ok(PageEnvelope::new(items, total, page, limit)))
}

/// GET /api/v1/documents/:id
async fn get_document(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DocumentDetailData>>> {
    let repo = DocumentRepository::new(state.db());
    let document = load_viewable(&repo, &id, viewer.as_ref()).await?;

    repo.touch_access(&document.id).await?;

    let annotations = AnnotationRepository::new(state.db())
        .list_for_document(&document, viewer.as_ref(), &AnnotationFilter::default())
        .await?;

    Ok(ApiResponse::ok(DocumentDetailData {
        annotation_count: annotations.len(),
        annotations,
        document,
    }))
}

/// GET /api/v1/documents/:id/file
async fn download_document(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let repo = DocumentRepository::new(state.db());
    let document = load_viewable(&repo, &id, viewer.as_ref()).await?;

    let data = state.storage().get_object(&document.storage_key).await?;

    repo.touch_access(&document.id).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", document.file_name),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))?)
}

/// PUT /api/v1/documents/:id
async fn update_document(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<ApiResponse<DocumentData>>> {
    let repo = DocumentRepository::new(state.db());
    let mut document = repo
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", id)))?;

    if !policy::can_mutate_document(&document, Some(&identity)) {
        return Err(AppError::Authorization(
            "Only the owner or an admin may modify this document".to_string(),
        ));
    }

    if let Some(title) = patch.title {
        validate_title(&title)?;
        document.title = title;
    }
    if let Some(description) = patch.description {
        validate_description(&description)?;
        document.description = Some(description);
    }
    if let Some(tags) = patch.tags {
        validate_tags(&tags)?;
        document.tags = tags;
    }
    if let Some(is_public) = patch.is_public {
        document.is_public = is_public;
    }
    document.updated_at = Utc::now();

    repo.update(&document).await?;

    Ok(ApiResponse::ok(DocumentData { document }))
}

/// DELETE /api/v1/documents/:id
///
/// Deletes the metadata and all annotations transactionally, then removes
/// the blob best-effort: the metadata deletion is authoritative and a blob
/// failure never rolls it back.
async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Empty>>> {
    let repo = DocumentRepository::new(state.db());
    let document = repo
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", id)))?;

    if !policy::can_mutate_document(&document, Some(&identity)) {
        return Err(AppError::Authorization(
            "Only the owner or an admin may delete this document".to_string(),
        ));
    }

    repo.delete(&document.id).await?;

    if let Err(e) = state.storage().delete_object(&document.storage_key).await {
        tracing::warn!(
            document_id = %document.id,
            storage_key = %document.storage_key,
            "Failed to delete blob after document removal: {}",
            e
        );
    }

    tracing::info!(document_id = %document.id, "Document deleted");

    Ok(ApiResponse::message("Document deleted"))
}

/// Load a document and enforce the read policy: 404 when absent, 403 when
/// present but not visible to this viewer
async fn load_viewable(
    repo: &DocumentRepository<'_>,
    id: &str,
    viewer: Option<&crate::auth::Identity>,
) -> Result<Document> {
    let document = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", id)))?;

    if !policy::can_view_document(&document, viewer) {
        return Err(AppError::Authorization(
            "This document is not public".to_string(),
        ));
    }

    Ok(document)
}
