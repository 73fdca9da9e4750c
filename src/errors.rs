use crate::{handlers::xml_escape, services::storage_service::StorageError};
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

/// An HTTP-facing failure: one status, one error code and one message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for requests no route matches.
    pub fn bad_request() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            "Wrong http-method and/or URL-address of the request",
        )
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, msg)
    }

    /// The fixed `<Error>` document sent as the response body.
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "\n<Error>",
                "<Code>{}</Code>",
                "<Message>{}</Message>",
                "</Error>\n"
            ),
            self.code,
            xml_escape(&self.message)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.to_xml()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml"),
        );
        response
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::InvalidBucketName { reason, .. } => AppError::new(
                StatusCode::BAD_REQUEST,
                "BucketNameInvalid",
                format!("Bucket name is invalid - {reason}"),
            ),
            StorageError::InvalidObjectKey { reason, .. } => AppError::new(
                StatusCode::BAD_REQUEST,
                "ObjectKeyInvalid",
                format!("Object key is invalid - {reason}"),
            ),
            StorageError::BucketAlreadyExists(_) => AppError::new(
                StatusCode::CONFLICT,
                "BucketNameUnavailable",
                "Bucket with this name already exists",
            ),
            StorageError::BucketNotFound(_) => AppError::new(
                StatusCode::NOT_FOUND,
                "BucketNotFound",
                "Bucket does not exist",
            ),
            StorageError::ObjectNotFound { .. } => AppError::new(
                StatusCode::NOT_FOUND,
                "ObjectNotFound",
                "Object does not exist",
            ),
            StorageError::BucketNotEmpty(_) => AppError::new(
                StatusCode::CONFLICT,
                "BucketNotEmpty",
                "Could not delete - bucket not empty",
            ),
            StorageError::ReservedKey(_) => AppError::new(
                StatusCode::FORBIDDEN,
                "MetadataAccessDenied",
                "Public metadata access is forbidden",
            ),
            StorageError::Metadata { .. } => {
                tracing::error!("{}", err);
                AppError::internal("MetadataError", "Could not access metadata")
            }
            StorageError::BucketCreation { .. } => {
                tracing::error!("{}", err);
                AppError::internal("BucketCreationError", "Could not create bucket")
            }
            StorageError::Io(_) => {
                tracing::error!("object I/O failed: {}", err);
                AppError::internal("ObjectAccessError", "Could not access object")
            }
        }
    }
}
