use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use tempfile::TempDir;
use tower::ServiceExt;

use triple_s::routes::routes::routes;
use triple_s::services::storage_service::StorageService;

async fn create_test_app() -> (Router, StorageService, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let service = StorageService::new(temp_dir.path().join("data"));
    service.init().await.expect("Failed to init storage root");
    let app = routes().with_state(service.clone());
    (app, service, temp_dir)
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let body = body_string(response).await;
    assert!(
        body.contains(&format!("<Code>{code}</Code>")),
        "expected {code} in {body}"
    );
    assert!(body.contains("<Message>"));
}

#[tokio::test]
async fn test_bucket_lifecycle_over_http() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let response = send(&app, Method::PUT, "/my-bucket", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("<Name>my-bucket</Name>"));
    assert!(body.contains("<Status>Active</Status>"));

    let response = send(&app, Method::GET, "/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert_eq!(body.matches("<Bucket>").count(), 1);
    assert!(body.contains("<Name>my-bucket</Name>"));

    let response = send(&app, Method::DELETE, "/my-bucket", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, "/", Body::empty()).await;
    let body = body_string(response).await;
    assert!(!body.contains("<Bucket>"));
}

#[tokio::test]
async fn test_bucket_errors_carry_codes() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let response = send(&app, Method::PUT, "/1.2.3.4", Body::empty()).await;
    assert_error(response, StatusCode::BAD_REQUEST, "BucketNameInvalid").await;

    send(&app, Method::PUT, "/taken", Body::empty()).await;
    let response = send(&app, Method::PUT, "/taken", Body::empty()).await;
    assert_error(response, StatusCode::CONFLICT, "BucketNameUnavailable").await;

    let response = send(&app, Method::DELETE, "/missing", Body::empty()).await;
    assert_error(response, StatusCode::NOT_FOUND, "BucketNotFound").await;

    send(&app, Method::PUT, "/taken/obj", Body::from("x")).await;
    let response = send(&app, Method::DELETE, "/taken", Body::empty()).await;
    assert_error(response, StatusCode::CONFLICT, "BucketNotEmpty").await;
}

#[tokio::test]
async fn test_object_roundtrip_headers() {
    let (app, _service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/photos", Body::empty()).await;

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/photos/cat.html")
        .header(header::CONTENT_TYPE, "text/html")
        .body(Body::from("<p>meow</p>"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, "/photos/cat.html", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "11");
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_string(response).await, "<p>meow</p>");
}

#[tokio::test]
async fn test_object_without_content_type_defaults_to_text_plain() {
    let (app, _service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/notes", Body::empty()).await;

    send(&app, Method::PUT, "/notes/a.txt", Body::from("hi")).await;
    let response = send(&app, Method::GET, "/notes/a.txt", Body::empty()).await;
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(body_string(response).await, "hi");
}

#[tokio::test]
async fn test_object_delete_and_errors() {
    let (app, service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/docs", Body::empty()).await;
    send(&app, Method::PUT, "/docs/readme", Body::from("read me")).await;

    let response = send(&app, Method::DELETE, "/docs/readme", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, "/docs/readme", Body::empty()).await;
    assert_error(response, StatusCode::NOT_FOUND, "ObjectNotFound").await;

    let response = send(&app, Method::GET, "/nowhere/readme", Body::empty()).await;
    assert_error(response, StatusCode::NOT_FOUND, "BucketNotFound").await;

    let table_before = std::fs::read(service.base_path.join("docs").join("objects.csv")).unwrap();
    let response = send(&app, Method::PUT, "/docs/objects.csv", Body::from("a,b")).await;
    assert_error(response, StatusCode::FORBIDDEN, "MetadataAccessDenied").await;
    let response = send(&app, Method::GET, "/docs/objects.csv", Body::empty()).await;
    assert_error(response, StatusCode::FORBIDDEN, "MetadataAccessDenied").await;
    assert_eq!(
        std::fs::read(service.base_path.join("docs").join("objects.csv")).unwrap(),
        table_before
    );

    let response = send(&app, Method::PUT, "/docs/a%2Fb", Body::from("x")).await;
    assert_error(response, StatusCode::BAD_REQUEST, "ObjectKeyInvalid").await;
    let response = send(&app, Method::PUT, "/docs/%2E%2E", Body::from("x")).await;
    assert_error(response, StatusCode::BAD_REQUEST, "ObjectKeyInvalid").await;
}

#[tokio::test]
async fn test_trailing_slash_routes() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let response = send(&app, Method::PUT, "/slashed/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::PUT, "/slashed/key/", Body::from("v")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, Method::GET, "/slashed/key", Body::empty()).await;
    assert_eq!(body_string(response).await, "v");

    let response = send(&app, Method::DELETE, "/slashed/key/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, Method::DELETE, "/slashed/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unrouted_requests_are_bad_requests() {
    let (app, _service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/things", Body::empty()).await;

    for (method, uri) in [
        (Method::POST, "/"),
        (Method::DELETE, "/"),
        (Method::GET, "/things"),
        (Method::POST, "/things/key"),
        (Method::GET, "/things/key/extra"),
    ] {
        let response = send(&app, method, uri, Body::empty()).await;
        assert_error(response, StatusCode::BAD_REQUEST, "BadRequest").await;
    }
}

#[tokio::test]
async fn test_undecodable_path_segments_get_error_documents() {
    let (app, _service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/bkt", Body::empty()).await;

    let response = send(&app, Method::GET, "/bkt/%FF", Body::empty()).await;
    assert_error(response, StatusCode::BAD_REQUEST, "BadRequest").await;

    let response = send(&app, Method::PUT, "/bkt/%FF", Body::from("x")).await;
    assert_error(response, StatusCode::BAD_REQUEST, "BadRequest").await;

    let response = send(&app, Method::PUT, "/%FF", Body::empty()).await;
    assert_error(response, StatusCode::BAD_REQUEST, "BadRequest").await;
}

#[tokio::test]
async fn test_listed_object_with_missing_file_is_server_error() {
    let (app, service, _temp_dir) = create_test_app().await;
    send(&app, Method::PUT, "/lossy", Body::empty()).await;
    send(&app, Method::PUT, "/lossy/vanished", Body::from("data")).await;
    std::fs::remove_file(service.base_path.join("lossy").join("vanished")).unwrap();

    let response = send(&app, Method::GET, "/lossy/vanished", Body::empty()).await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "ObjectAccessError").await;
}
