//! Test helper module for login-service integration tests.
//!
//! Wires the real `AuthService` and router to the in-memory stores.

#![allow(dead_code)]

use login_service::{
    build_router,
    config::{
        CredentialConfig, DatabaseConfig, Environment, LoginConfig, RedisConfig, SessionConfig,
    },
    models::CredentialRecord,
    services::{AuthService, MockCredentialStore, MockSessionStore, UsernamePolicy},
    utils::{hash_password, Password},
    AppState,
};
use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_TTL_SECONDS: i64 = 3600;
pub const COOKIE_NAME: &str = "session_id";

pub struct TestApp {
    pub state: AppState,
    pub credentials: Arc<MockCredentialStore>,
    pub sessions: Arc<MockSessionStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with_policy(UsernamePolicy::CaseSensitive)
    }

    pub fn spawn_with_policy(policy: UsernamePolicy) -> Self {
        let config = create_test_config(policy == UsernamePolicy::CaseSensitive);
        let credentials = Arc::new(MockCredentialStore::new(policy));
        let sessions = Arc::new(MockSessionStore::new());

        let auth_service = AuthService::new(
            credentials.clone(),
            sessions.clone(),
            config.session.ttl().unwrap(),
        );

        Self {
            state: AppState {
                config,
                auth_service,
            },
            credentials,
            sessions,
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.state.auth_service
    }

    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Provision an account the way an out-of-band tool would.
    pub fn provision(&self, username: &str, password: &str) -> Uuid {
        let hash = hash_password(&Password::new(password.to_string()))
            .expect("Failed to hash password");
        let user_id = Uuid::new_v4();
        self.credentials
            .insert(CredentialRecord::new(user_id, username.to_string(), hash))
            .expect("Failed to provision credentials");
        user_id
    }
}

pub fn create_test_config(username_case_sensitive: bool) -> LoginConfig {
    LoginConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "login-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "test".to_string(),
            password: SecretString::new("test".to_string()),
            name: "company".to_string(),
            max_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        },
        session: SessionConfig {
            ttl_seconds: SESSION_TTL_SECONDS,
            cookie_name: COOKIE_NAME.to_string(),
            cookie_secure: true,
        },
        credentials: CredentialConfig {
            username_case_sensitive,
        },
    }
}
