//! Session cookie construction and parsing.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;
use crate::models::{Session, SessionId};

/// `HttpOnly; SameSite=Strict; Path=/`, `Secure` unless disabled for local
/// development, `Max-Age` bounded by the session's remaining lifetime.
pub fn session_cookie(config: &SessionConfig, session: &Session) -> Cookie<'static> {
    Cookie::build((
        config.cookie_name.clone(),
        session.session_id.as_str().to_string(),
    ))
    .path("/")
    .http_only(true)
    .secure(config.cookie_secure)
    .same_site(SameSite::Strict)
    .max_age(time::Duration::seconds(session.remaining_seconds()))
    .build()
}

/// Cookie that tells the browser to drop the session cookie.
pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .build()
}

/// The session id the client presented, if it is well-formed.
pub fn presented_session(jar: &CookieJar, config: &SessionConfig) -> Option<SessionId> {
    jar.get(&config.cookie_name)
        .and_then(|cookie| SessionId::parse(cookie.value()))
}
