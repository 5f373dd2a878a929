//! Bearer-token sessions
//!
//! Tokens are opaque random hex strings handed to the client once; only their
//! SHA-256 digest is stored.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

/// Generate a session token: 24 random bytes, hex-encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest used to look a token up at rest
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A stored session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Repository for session persistence
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a session for a user; returns the token to hand to the client
    pub async fn create(&self, user_id: &str, ttl_hours: i64) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_hash: token_digest(&token),
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(token)
    }

    /// Resolve a presented token to the user it belongs to
    ///
    /// Expired sessions resolve to `None`; the caller treats that as
    /// anonymous, not as an error.
    pub async fn resolve(&self, token: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?",
        )
        .bind(token_digest(token))
        .fetch_optional(self.pool)
        .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)?.with_timezone(&Utc);
        if Utc::now() > expires_at {
            return Ok(None);
        }

        Ok(Some(user_id))
    }

    /// Invalidate the session behind a presented token
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_digest(token))
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
