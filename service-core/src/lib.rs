//! service-core: Shared infrastructure for the login service workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
