use service_core::error::AppError;
use thiserror::Error;

/// The only message a client ever sees for a rejected login.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong username or wrong password; the two are never distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string())
            }
            AuthError::StoreUnavailable(e) => AppError::ServiceUnavailable(e),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}
