//! HTTP handlers for object operations.
//! Upload bodies are streamed to disk and storage concerns are delegated to
//! `StorageService`.

use super::StoragePath;
use crate::{errors::AppError, models::object::StoredObject, services::storage_service::StorageService};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;

/// Upload an object to `/{bucket}/{key}`.
pub async fn put_object(
    State(service): State<StorageService>,
    StoragePath((bucket, key)): StoragePath<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let stream = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));

    service
        .put_object_stream(&bucket, &key, content_type, stream)
        .await?;

    Ok(StatusCode::OK)
}

/// Download an object `/{bucket}/{key}`.
pub async fn get_object(
    State(service): State<StorageService>,
    StoragePath((bucket, key)): StoragePath<(String, String)>,
) -> Result<Response, AppError> {
    let object = service.get_object(&bucket, &key).await?;

    let mut headers = HeaderMap::new();
    set_object_headers(&mut headers, &object);

    let mut response = Response::new(Body::from(object.data));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

/// DELETE `/{bucket}/{key}`.
pub async fn delete_object(
    State(service): State<StorageService>,
    StoragePath((bucket, key)): StoragePath<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_object(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Any method/path combination no route serves.
pub async fn bad_request() -> AppError {
    AppError::bad_request()
}

fn set_object_headers(headers: &mut HeaderMap, object: &StoredObject) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.record.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.content_length()));

    let last_modified = object
        .record
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
