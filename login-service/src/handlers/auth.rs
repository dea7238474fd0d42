use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, MessageResponse, SessionResponse},
    handlers::cookie::{presented_session, removal_cookie, session_cookie},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with username and password
///
/// Any session cookie the client already holds is retired and replaced.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let presented = presented_session(&jar, &state.config.session);
    let LoginRequest { username, password } = req;

    let session = state
        .auth_service
        .authenticate(&username, Password::new(password), presented.as_ref())
        .await?;

    let jar = jar.add(session_cookie(&state.config.session, &session));
    Ok((StatusCode::OK, jar, Json(LoginResponse::from(&session))))
}

/// Logout and invalidate the session
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(session_id) = presented_session(&jar, &state.config.session) {
        state.auth_service.logout(&session_id).await?;
    }

    let jar = jar.remove(removal_cookie(&state.config.session));
    Ok((
        StatusCode::OK,
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Describe the caller's current session
pub async fn current_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session_id = presented_session(&jar, &state.config.session)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let session = state
        .auth_service
        .resolve(&session_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    Ok((StatusCode::OK, Json(SessionResponse::from(&session))))
}
