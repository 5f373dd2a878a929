//! Annotation endpoints
//!
//! Create, list, edit, delete, and threaded replies. Read access to a
//! document is sufficient to annotate it; privacy and authorship rules are
//! enforced by the visibility policy.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::annotations::{
    validate_reply_text, Annotation, AnnotationContent, AnnotationFilter, AnnotationRepository,
    AnnotationType, Reply,
};
use crate::auth::{CurrentUser, MaybeUser};
use crate::documents::{Document, DocumentRepository};
use crate::error::{AppError, Result};
use crate::policy;
use crate::state::AppState;

use super::{normalize_paging, ApiResponse, Empty, PageEnvelope};

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_annotation))
        .route("/document/:document_id", get(list_document_annotations))
        .route("/mine", get(list_my_annotations))
        .route(
            "/:id",
            get(get_annotation).put(update_annotation).delete(delete_annotation),
        )
        .route("/:id/replies", post(add_reply))
        .route("/:id/replies/:reply_id", delete(delete_reply))
        .route("/:id/resolve", put(resolve_annotation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotationRequest {
    pub document_id: String,
    pub page: i64,
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    #[serde(default)]
    pub content: AnnotationContent,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnotationRequest {
    /// Shallow content patch: present keys replace, absent keys survive
    pub content: Option<AnnotationContent>,
    pub is_private: Option<bool>,
    pub is_resolved: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AnnotationListParams {
    /// Page of the document, not the listing
    pub page: Option<i64>,
    #[serde(rename = "type")]
    pub annotation_type: Option<String>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MineListParams {
    #[serde(rename = "type")]
    pub annotation_type: Option<String>,
    pub resolved: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnnotationData {
    pub annotation: Annotation,
}

#[derive(Debug, Serialize)]
pub struct AnnotationListData {
    pub count: usize,
    pub items: Vec<Annotation>,
}

#[derive(Debug, Serialize)]
pub struct ReplyData {
    pub reply: Reply,
}

/// POST /api/v1/annotations
async fn create_annotation(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(req): Json<CreateAnnotationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AnnotationData>>)> {
    let document = load_document(&state, &req.document_id).await?;

    // Read access is all it takes to annotate
    if !policy::can_view_document(&document, Some(&identity)) {
        return Err(AppError::Authorization(
            "No access to this document".to_string(),
        ));
    }

    let mut annotation = Annotation::new(
        &document.id,
        &identity.user_id,
        req.page,
        req.annotation_type,
    )
    .with_content(req.content);
    annotation.is_private = req.is_private;
    annotation.tags = req.tags;
    annotation.validate()?;

    AnnotationRepository::new(state.db()).insert(&annotation).await?;

    tracing::debug!(
        annotation_id = %annotation.id,
        document_id = %document.id,
        author_id = %identity.user_id,
        "Annotation created"
    );

    Ok((StatusCode::CREATED, ApiResponse::ok(AnnotationData { annotation })))
}

/// GET /api/v1/annotations/document/:document_id
///
/// Items the viewer may not see are excluded, never an error; lacking
/// access to the document itself is.
async fn list_document_annotations(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(document_id): Path<String>,
    Query(params): Query<AnnotationListParams>,
) -> Result<Json<ApiResponse<AnnotationListData>>> {
    let document = load_document(&state, &document_id).await?;

    if !policy::can_view_document(&document, viewer.as_ref()) {
        return Err(AppError::Authorization(
            "No access to this document".to_string(),
        ));
    }

    let filter = AnnotationFilter {
        page: params.page,
        annotation_type: parse_type(params.annotation_type.as_deref())?,
        resolved: params.resolved,
    };

    let items = AnnotationRepository::new(state.db())
        .list_for_document(&document, viewer.as_ref(), &filter)
        .await?;

    Ok(ApiResponse::ok(AnnotationListData {
        count: items.len(),
        items,
    }))
}

/// GET /api/v1/annotations/mine
async fn list_my_annotations(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(params): Query<MineListParams>,
) -> Result<Json<ApiResponse<PageEnvelope<Annotation>>>> {
    let (page, limit) = normalize_paging(params.page, params.limit);
    let filter = AnnotationFilter {
        page: None,
        annotation_type: parse_type(params.annotation_type.as_deref())?,
        resolved: params.resolved,
    };

    let (items, total) = AnnotationRepository::new(state.db())
        .list_for_author(&identity.user_id, &filter, page, limit)
        .await?;

    Ok(ApiResponse::ok(PageEnvelope::new(items, total, page, limit)))
}

/// GET /api/v1/annotations/:id
async fn get_annotation(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AnnotationData>>> {
    let annotation = load_annotation(&state, &id).await?;
    let document = load_document(&state, &annotation.document_id).await?;

    if !policy::can_view_annotation(&annotation, &document, viewer.as_ref()) {
        return Err(AppError::Authorization(
            "No access to this annotation".to_string(),
        ));
    }

    Ok(ApiResponse::ok(AnnotationData { annotation }))
}

/// PUT /api/v1/annotations/:id
async fn update_annotation(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateAnnotationRequest>,
) -> Result<Json<ApiResponse<AnnotationData>>> {
    let mut annotation = load_annotation(&state, &id).await?;

    if !policy::can_edit_annotation(&annotation, Some(&identity)) {
        return Err(AppError::Authorization(
            "Only the author may edit an annotation".to_string(),
        ));
    }

    if let Some(patch) = req.content {
        annotation.content.merge(patch);
    }
    if let Some(is_private) = req.is_private {
        annotation.is_private = is_private;
    }
    if let Some(is_resolved) = req.is_resolved {
        annotation.is_resolved = is_resolved;
    }
    if let Some(tags) = req.tags {
        annotation.tags = tags;
    }
    annotation.updated_at = Utc::now();
    annotation.validate()?;

    AnnotationRepository::new(state.db()).update(&annotation).await?;

    Ok(ApiResponse::ok(AnnotationData { annotation }))
}

/// PUT /api/v1/annotations/:id/resolve
async fn resolve_annotation(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AnnotationData>>> {
    let mut annotation = load_annotation(&state, &id).await?;

    if !policy::can_edit_annotation(&annotation, Some(&identity)) {
        return Err(AppError::Authorization(
            "Only the author may resolve an annotation".to_string(),
        ));
    }

    annotation.is_resolved = true;
    annotation.updated_at = Utc::now();
    AnnotationRepository::new(state.db()).update(&annotation).await?;

    Ok(ApiResponse::ok(AnnotationData { annotation }))
}

/// DELETE /api/v1/annotations/:id
async fn delete_annotation(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Empty>>> {
    let annotation = load_annotation(&state, &id).await?;

    if !policy::can_delete_annotation(&annotation, Some(&identity)) {
        return Err(AppError::Authorization(
            "Only the author or an admin may delete an annotation".to_string(),
        ));
    }

    AnnotationRepository::new(state.db()).delete(&annotation.id).await?;

    tracing::debug!(annotation_id = %annotation.id, "Annotation deleted");

    Ok(ApiResponse::message("Annotation deleted"))
}

#[derive(Debug, Deserialize)]
pub struct AddReplyRequest {
    pub text: String,
}

/// POST /api/v1/annotations/:id/replies
async fn add_reply(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AddReplyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReplyData>>)> {
    let mut annotation = load_annotation(&state, &id).await?;
    let document = load_document(&state, &annotation.document_id).await?;

    if !policy::can_reply(&annotation, &document, Some(&identity)) {
        return Err(AppError::Authorization(
            "Replies are not allowed on this annotation".to_string(),
        ));
    }

    let text = validate_reply_text(&req.text)?;
    let reply = Reply::new(&identity.user_id, &text);
    annotation.replies.push(reply.clone());

    AnnotationRepository::new(state.db())
        .set_replies(&annotation.id, &annotation.replies)
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(ReplyData { reply })))
}

/// DELETE /api/v1/annotations/:id/replies/:reply_id
async fn delete_reply(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path((id, reply_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    let mut annotation = load_annotation(&state, &id).await?;

    let reply = annotation
        .replies
        .iter()
        .find(|r| r.id == reply_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Reply '{}' not found", reply_id)))?;

    if !policy::can_delete_reply(&reply, &annotation, Some(&identity)) {
        return Err(AppError::Authorization(
            "Not allowed to delete this reply".to_string(),
        ));
    }

    annotation.replies.retain(|r| r.id != reply_id);
    AnnotationRepository::new(state.db())
        .set_replies(&annotation.id, &annotation.replies)
        .await?;

    Ok(ApiResponse::message("Reply deleted"))
}

fn parse_type(value: Option<&str>) -> Result<Option<AnnotationType>> {
    value
        .map(|s| {
            AnnotationType::parse(s)
                .ok_or_else(|| AppError::Validation(format!("Unknown annotation type '{}'", s)))
        })
        .transpose()
}

async fn load_document(state: &AppState, id: &str) -> Result<Document> {
    DocumentRepository::new(state.db())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", id)))
}

async fn load_annotation(state: &AppState, id: &str) -> Result<Annotation> {
    AnnotationRepository::new(state.db())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Annotation '{}' not found", id)))
}
