use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body that has passed `validator` rules.
///
/// Rejections go through `AppError`, so they share the `{error}` body of
/// every other failure. Serde's message is logged at debug level only: it can
/// quote the offending value, which may be a password.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| {
                tracing::debug!(status = %e.status(), "Rejected malformed JSON body");
                AppError::BadRequest("Malformed request body".to_string())
            })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
