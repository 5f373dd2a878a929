//! Authentication and identity
//!
//! Password accounts with argon2 hashing, opaque bearer-token sessions, and
//! axum extractors that resolve a request to an [`Identity`] or anonymous.

mod extract;
mod password;
mod session;
mod users;

pub use extract::{CurrentUser, MaybeUser};
pub use password::{hash_password, verify_password};
pub use session::{generate_token, token_digest, Session, SessionRepository};
pub use users::{Role, User, UserRepository};

use serde::{Deserialize, Serialize};

/// The authenticated caller of a request
///
/// Anonymous callers are represented as `Option<Identity>` = `None` wherever
/// the visibility policy accepts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
        }
    }
}
