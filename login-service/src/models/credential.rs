//! Credential record - stored identity and password hash for one account.

use uuid::Uuid;

use crate::utils::PasswordHashString;

/// Read-only view of an account's login credentials.
///
/// Provisioned elsewhere; this service only reads it. `Debug` is safe to log
/// because `PasswordHashString` redacts itself.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: PasswordHashString,
}

impl CredentialRecord {
    pub fn new(user_id: Uuid, username: String, password_hash: PasswordHashString) -> Self {
        Self {
            user_id,
            username,
            password_hash,
        }
    }
}
