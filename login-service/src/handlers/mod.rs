pub mod auth;
pub mod cookie;

pub use auth::{current_session, login, logout};
