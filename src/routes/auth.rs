//! Authentication endpoints
//!
//! Register, login, logout, and identity lookup. The first registered
//! account becomes the admin.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{
    hash_password, verify_password, CurrentUser, Role, SessionRepository, User, UserRepository,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

use super::{ApiResponse, Empty};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 50;

/// Create the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthData {
    pub token: String,
    pub user: User,
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>)> {
    let username = req.username.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let users = UserRepository::new(state.db());
    if users.find_by_username(username).await?.is_some() {
        return Err(AppError::Validation("Username is already taken".to_string()));
    }

    let role = if users.count().await? == 0 {
        Role::Admin
    } else {
        Role::User
    };

    let user = User::new(username, hash_password(&req.password)?, role);
    users.insert(&user).await?;

    let token = SessionRepository::new(state.db())
        .create(&user.id, state.config().auth.session_ttl_hours)
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, ApiResponse::ok(AuthData { token, user })))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<ApiResponse<AuthData>>> {
    let users = UserRepository::new(state.db());

    let user = users
        .find_by_username(req.username.trim())
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        ));
    }

    let token = SessionRepository::new(state.db())
        .create(&user.id, state.config().auth.session_ttl_hours)
        .await?;

    tracing::debug!(user_id = %user.id, "User logged in");

    Ok(ApiResponse::ok(AuthData { token, user }))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Empty>>> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Authentication("Missing bearer token".to_string()))?;

    SessionRepository::new(state.db()).revoke(token).await?;

    Ok(ApiResponse::message("Logged out"))
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: User,
}

/// GET /api/v1/auth/me
async fn me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<MeData>>> {
    let user = UserRepository::new(state.db())
        .get(&identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(MeData { user }))
}
