//! HTTP routes
//!
//! Every response body is an envelope: `success` plus either data fields or
//! an error type and message. List endpoints add `count`, `total`, `page`,
//! `pages`, and `items`.

pub mod annotations;
pub mod auth;
pub mod documents;
pub mod health;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let max_upload = state.config().upload.max_file_size;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/documents", documents::router(max_upload))
        .nest("/api/v1/annotations", annotations::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Success envelope; `data` fields are flattened alongside `success`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data,
        })
    }
}

/// An envelope that carries only a message
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    pub fn message(message: &str) -> Json<Self> {
        Self::with_message(message, Empty {})
    }
}

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct PageEnvelope<T: Serialize> {
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub items: Vec<T>,
}

impl<T: Serialize> PageEnvelope<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        Self {
            count: items.len(),
            total,
            page,
            pages: pages_for(total, limit),
            items,
        }
    }
}

/// Number of pages a listing spans; zero items means zero pages
pub fn pages_for(total: i64, limit: i64) -> i64 {
    if total == 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Clamp client paging parameters to sane values
pub fn normalize_paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    (page, limit)
}
