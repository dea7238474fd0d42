pub mod credential;
pub mod session;

pub use credential::CredentialRecord;
pub use session::{expiry_after, Session, SessionId, SessionRecord, SESSION_ID_BYTES};
