//! Services layer for login-service.
//!
//! The credential verifier and the store collaborators it is wired to.

mod auth;
pub mod credential_store;
pub mod error;
pub mod session_store;

pub use auth::AuthService;
pub use credential_store::{
    CredentialStore, MockCredentialStore, PgCredentialStore, UsernamePolicy,
};
pub use error::{AuthError, INVALID_CREDENTIALS_MESSAGE};
pub use session_store::{MockSessionStore, RedisSessionStore, SessionStore};
