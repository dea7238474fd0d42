use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    models::{expiry_after, Session, SessionId},
    services::{AuthError, CredentialStore, SessionStore},
    utils::{dummy_hash, verify_password, Password},
};

/// Credential verifier and session issuer.
///
/// Holds only shared store handles and immutable settings, so clones can be
/// used from any number of concurrent requests.
#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            sessions,
            session_ttl,
        }
    }

    /// Verify `username`/`password` and issue a new session.
    ///
    /// Unknown usernames still pay for a full Argon2 verification against the
    /// dummy hash. On success the new session is created first and the
    /// client's `presented` session (if any) is invalidated after it. On
    /// failure nothing is written.
    pub async fn authenticate(
        &self,
        username: &str,
        password: Password,
        presented: Option<&SessionId>,
    ) -> Result<Session, AuthError> {
        let record = self
            .credentials
            .find_by_username(username)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Credential store lookup failed");
                AuthError::StoreUnavailable(e)
            })?;

        let (user_id, password_hash) = match &record {
            Some(r) => (Some(r.user_id), r.password_hash.clone()),
            None => (None, dummy_hash()),
        };
        let username = record.map(|r| r.username).unwrap_or_default();

        // Argon2 is CPU-bound; keep it off the async workers.
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password verification task failed");
                AuthError::Internal(anyhow::anyhow!("Password verification task failed: {}", e))
            })?;

        let matched = match verified {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(user_id = ?user_id, error = %e, "Stored password hash is unusable");
                false
            }
        };

        let user_id = match (user_id, matched) {
            (Some(user_id), true) => user_id,
            _ => {
                tracing::info!("Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if expiry_after(Utc::now(), self.session_ttl).is_none() {
            tracing::error!(
                ttl_seconds = self.session_ttl.num_seconds(),
                "Session TTL is out of range"
            );
            return Err(AuthError::Internal(anyhow::anyhow!(
                "Session TTL of {}s is out of range",
                self.session_ttl.num_seconds()
            )));
        }

        let session = self
            .sessions
            .create(user_id, &username, self.session_ttl)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to create session");
                AuthError::StoreUnavailable(e)
            })?;

        if let Some(presented) = presented {
            if let Err(e) = self.sessions.invalidate(presented).await {
                tracing::error!(error = %e, "Failed to invalidate presented session");
                // The caller never receives the new id, so retire it too.
                if let Err(retire_err) = self.sessions.invalidate(&session.session_id).await {
                    tracing::error!(error = %retire_err, "Failed to retire unissued session");
                }
                return Err(AuthError::StoreUnavailable(e));
            }
        }

        tracing::info!(user_id = %user_id, expires_at = %session.expires_at, "User logged in");
        Ok(session)
    }

    /// Look up a live session. Expired records are invalidated and reported
    /// as absent.
    pub async fn resolve(&self, session_id: &SessionId) -> Result<Option<Session>, AuthError> {
        let session = self.sessions.find(session_id).await.map_err(|e| {
            tracing::error!(error = %e, "Session lookup failed");
            AuthError::StoreUnavailable(e)
        })?;

        match session {
            Some(session) if session.is_expired() => {
                self.sessions.invalidate(session_id).await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to drop expired session");
                    AuthError::StoreUnavailable(e)
                })?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn logout(&self, session_id: &SessionId) -> Result<(), AuthError> {
        self.sessions.invalidate(session_id).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to invalidate session on logout");
            AuthError::StoreUnavailable(e)
        })?;
        tracing::info!("Session invalidated on logout");
        Ok(())
    }

    /// Ping both collaborators.
    pub async fn health_check(&self) -> Result<(), AuthError> {
        self.credentials
            .health_check()
            .await
            .map_err(AuthError::StoreUnavailable)?;
        self.sessions
            .health_check()
            .await
            .map_err(AuthError::StoreUnavailable)?;
        Ok(())
    }
}
