//! Session model - server-held proof of a successful login.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Raw entropy per session id: 256 bits.
pub const SESSION_ID_BYTES: usize = 32;

/// Opaque session token handed to the client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh id from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a client-supplied token only if it has the exact shape we mint.
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.as_bytes()).ok()?;
        if bytes.len() != SESSION_ID_BYTES {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which stores index this session: hex SHA-256 of the token.
    pub fn storage_key(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionId([REDACTED])")
    }
}

/// An issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: Uuid,
    /// Username as stored on the credential record, not as typed at login.
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a freshly generated id.
    ///
    /// Fails when `ttl` pushes the expiry past the representable date range.
    pub fn new(user_id: Uuid, username: &str, ttl: Duration) -> Result<Self, anyhow::Error> {
        let now = Utc::now();
        let expires_at = expiry_after(now, ttl)
            .ok_or_else(|| anyhow::anyhow!("Session TTL of {}s is out of range", ttl.num_seconds()))?;
        Ok(Self {
            session_id: SessionId::generate(),
            user_id,
            username: username.to_string(),
            created_at: now,
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Seconds left before expiry, never below zero.
    pub fn remaining_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            user_id: self.user_id,
            username: self.username.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// `now + ttl`, or `None` if that overflows.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    now.checked_add_signed(ttl)
}

/// What a store persists for a session. The token is not part of it; stores
/// key records by `SessionId::storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn into_session(self, session_id: SessionId) -> Session {
        Session {
            session_id,
            user_id: self.user_id,
            username: self.username,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
