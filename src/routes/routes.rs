//! Defines routes for all bucket and object operations.
//!
//! ## Structure
//! - `GET    /`: list buckets
//! - `PUT    /{bucket}`: create bucket
//! - `DELETE /{bucket}`: delete bucket
//! - `PUT    /{bucket}/{key}`: upload object
//! - `GET    /{bucket}/{key}`: download object
//! - `DELETE /{bucket}/{key}`: delete object
//!
//! Each bucket and object path is also served with a trailing slash. Keys
//! are a single path segment. Any other method or path is answered with a
//! `BadRequest` error document.

use crate::{
    handlers::{
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        object_handlers::{bad_request, delete_object, get_object, put_object},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    routing::{MethodRouter, get, put},
};

/// Build and return the router for all routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/", get(list_buckets).fallback(bad_request))
        .route("/{bucket}", bucket_routes())
        .route("/{bucket}/", bucket_routes())
        .route("/{bucket}/{key}", object_routes())
        .route("/{bucket}/{key}/", object_routes())
        .fallback(bad_request)
}

fn bucket_routes() -> MethodRouter<StorageService> {
    put(create_bucket).delete(delete_bucket).fallback(bad_request)
}

fn object_routes() -> MethodRouter<StorageService> {
    put(put_object)
        .get(get_object)
        .delete(delete_object)
        .fallback(bad_request)
}
