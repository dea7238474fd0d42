use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::services::UsernamePolicy;

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub credentials: CredentialConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Connection parameters for the credential database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection options for the pool. The password never leaves `secrecy`
    /// except into the driver.
    pub fn connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        sqlx::postgres::PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Longest session lifetime accepted from configuration: 30 days.
pub const MAX_SESSION_TTL_SECONDS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_seconds: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl SessionConfig {
    pub fn ttl(&self) -> Result<chrono::Duration, AppError> {
        chrono::Duration::try_seconds(self.ttl_seconds).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_SECONDS is out of range: {}",
                self.ttl_seconds
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub username_case_sensitive: bool,
}

impl CredentialConfig {
    pub fn username_policy(&self) -> UsernamePolicy {
        if self.username_case_sensitive {
            UsernamePolicy::CaseSensitive
        } else {
            UsernamePolicy::CaseInsensitive
        }
    }
}

impl LoginConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = LoginConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("login-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                host: get_env("DB_HOST", Some("localhost"), is_prod)?,
                port: parse_env("DB_PORT", "5432", is_prod)?,
                user: get_env("DB_USER", None, is_prod)?,
                password: SecretString::new(get_env("DB_PASS", None, is_prod)?),
                name: get_env("DB_NAME", Some("company"), is_prod)?,
                max_connections: parse_env("DB_MAX_CONNECTIONS", "10", is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", Some("redis://127.0.0.1:6379"), is_prod)?,
            },
            session: SessionConfig {
                ttl_seconds: parse_env("SESSION_TTL_SECONDS", "3600", is_prod)?,
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("session_id"), is_prod)?,
                cookie_secure: parse_env("SESSION_COOKIE_SECURE", "true", is_prod)?,
            },
            credentials: CredentialConfig {
                username_case_sensitive: parse_env("USERNAME_CASE_SENSITIVE", "true", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "APP__PORT must be greater than 0"
            )));
        }

        if self.session.ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_SECONDS must be positive"
            )));
        }

        if self.session.ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_SECONDS must not exceed {}",
                MAX_SESSION_TTL_SECONDS
            )));
        }

        if !is_valid_cookie_name(&self.session.cookie_name) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_COOKIE_NAME contains invalid characters"
            )));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DB_MAX_CONNECTIONS must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod && !self.session.cookie_secure {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_COOKIE_SECURE cannot be disabled in production"
            )));
        }

        Ok(())
    }
}

fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
    })
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
