//! Request extractors.

use crate::errors::ScError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

/// `Json<T>` whose rejections render as `ScError::Validation`.
///
/// Malformed bodies, wrong content types and schema mismatches all answer
/// with the failure envelope and HTTP 400 instead of axum's plain-text
/// rejection.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ScError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ScError::Validation(rejection.body_text())),
        }
    }
}
