//! HTTP handlers. Bodies are XML documents built by hand; values are escaped
//! with [`xml_escape`].

pub mod bucket_handlers;
pub mod object_handlers;

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::{StatusCode, request::Parts},
};
use serde::de::DeserializeOwned;

/// `Path` extractor whose rejection is rendered as an `<Error>` document.
#[derive(Debug)]
pub struct StoragePath<T>(pub T);

impl<T, S> FromRequestParts<S> for StoragePath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(StoragePath(value)),
            Err(rejection) => {
                tracing::debug!("rejected path {}: {}", parts.uri.path(), rejection.body_text());
                Err(AppError::new(
                    StatusCode::BAD_REQUEST,
                    "BadRequest",
                    rejection.body_text(),
                ))
            }
        }
    }
}

pub(crate) fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
