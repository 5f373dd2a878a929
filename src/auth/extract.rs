//! Request extractors for caller identity

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::error::AppError;
use crate::state::AppState;

use super::{Identity, SessionRepository, UserRepository};

/// Extracts an authenticated caller; rejects anonymous requests with 401
pub struct CurrentUser(pub Identity);

/// Extracts the caller if authenticated, anonymous otherwise
///
/// A missing Authorization header is anonymous; a present but invalid or
/// expired token is an authentication error, not anonymous.
pub struct MaybeUser(pub Option<Identity>);

/// Pull the bearer token out of the Authorization header, if any
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts).map(str::to_string) else {
            return Ok(MaybeUser(None));
        };

        let app_state = AppState::from_ref(state);
        let sessions = SessionRepository::new(app_state.db());

        let user_id = sessions
            .resolve(&token)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid or expired token".to_string()))?;

        let user = UserRepository::new(app_state.db())
            .get(&user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Unknown user".to_string()))?;

        Ok(MaybeUser(Some(Identity::from(&user))))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(identity) = MaybeUser::from_request_parts(parts, state).await?;

        identity
            .map(CurrentUser)
            .ok_or_else(|| AppError::Authentication("Missing bearer token".to_string()))
    }
}
