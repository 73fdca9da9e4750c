//! HTTP handlers for bucket operations.

use super::{StoragePath, xml_escape};
use crate::{
    errors::AppError,
    models::{bucket::BucketRecord, timestamp},
    services::storage_service::StorageService,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// GET `/`: list Active buckets.
pub async fn list_buckets(State(service): State<StorageService>) -> Result<Response, AppError> {
    let buckets = service.list_buckets().await?;
    Ok(xml_response(StatusCode::OK, build_bucket_list_xml(&buckets)))
}

/// PUT `/{bucket}`: create bucket.
pub async fn create_bucket(
    State(service): State<StorageService>,
    StoragePath(bucket): StoragePath<String>,
) -> Result<Response, AppError> {
    let record = service.create_bucket(&bucket).await?;

    let xml = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n<CreateBucketResult>",
            "<Name>{}</Name>",
            "<CreationTime>{}</CreationTime>",
            "<Status>{}</Status>",
            "</CreateBucketResult>\n"
        ),
        xml_escape(&record.name),
        record.creation_time.format(timestamp::FORMAT),
        record.status.as_str()
    );
    Ok(xml_response(StatusCode::OK, xml))
}

/// DELETE `/{bucket}`: delete an empty bucket.
pub async fn delete_bucket(
    State(service): State<StorageService>,
    StoragePath(bucket): StoragePath<String>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_bucket(&bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn build_bucket_list_xml(buckets: &[BucketRecord]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ListAllMyBucketsResult><Buckets>",
    );
    for bucket in buckets {
        xml.push_str("<Bucket>");
        xml.push_str(&format!("<Name>{}</Name>", xml_escape(&bucket.name)));
        xml.push_str(&format!(
            "<CreationTime>{}</CreationTime>",
            bucket.creation_time.format(timestamp::FORMAT)
        ));
        xml.push_str(&format!(
            "<LastModifiedTime>{}</LastModifiedTime>",
            bucket.last_modified_time.format(timestamp::FORMAT)
        ));
        xml.push_str(&format!("<Status>{}</Status>", bucket.status.as_str()));
        xml.push_str("</Bucket>");
    }
    xml.push_str("</Buckets></ListAllMyBucketsResult>\n");
    xml
}

pub(crate) fn xml_response(status: StatusCode, xml: String) -> Response {
    let mut response = Response::new(Body::from(xml));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    response
}
