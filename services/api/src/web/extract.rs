//! services/api/src/web/extract.rs
//!
//! Request extractors whose rejections answer with the service's own error body.

use crate::error::HttpError;
use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    FromRequest, FromRequestParts, Path, Request,
};
use axum::http::request::Parts;
use axum::Json;
use value_coach_core::FlowError;

/// `Json<T>` for request bodies. A body that is missing, malformed or of the
/// wrong shape is a `Validation` error, answered as `400 { "error": ... }`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(HttpError(FlowError::Validation(rejection.body_text()))),
        }
    }
}

/// `Path<T>` with the same error body for unparseable segments.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(HttpError(FlowError::Validation(rejection.body_text()))),
        }
    }
}
