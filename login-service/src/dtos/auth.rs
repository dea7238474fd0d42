use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::Session;

/// Login form. Lengths are bounded so oversized input never reaches Argon2.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, max = 1024, message = "Password is required"))]
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for LoginResponse {
    fn from(s: &Session) -> Self {
        Self {
            user_id: s.user_id,
            username: s.username.clone(),
            expires_at: s.expires_at,
        }
    }
}

/// Current session as seen by its owner. The token itself stays in the cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(s: &Session) -> Self {
        Self {
            user_id: s.user_id,
            username: s.username.clone(),
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
