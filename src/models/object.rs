//! Represents an object (file) stored in a bucket.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type recorded when the writer does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// One row of a bucket's object table (`objects.csv`).
///
/// The `ObjectRecord` stores metadata only; the bytes live in a file named by
/// the key inside the bucket directory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRecord {
    /// Object key, unique within the bucket.
    #[serde(rename = "ObjectKey")]
    pub key: String,

    /// Size in bytes of the stored content.
    pub size: u64,

    /// Content type (MIME type).
    pub content_type: String,

    /// Timestamp when object was last written.
    #[serde(with = "super::timestamp")]
    pub last_modified: DateTime<Utc>,
}

impl ObjectRecord {
    /// Build a record, falling back to [`DEFAULT_CONTENT_TYPE`] for a missing
    /// or blank content type.
    pub fn new(
        key: impl Into<String>,
        size: u64,
        content_type: Option<&str>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        Self {
            key: key.into(),
            size,
            content_type: content_type.to_string(),
            last_modified,
        }
    }
}

/// An object read back from a bucket: its row plus the bytes on disk.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub record: ObjectRecord,
    pub data: Bytes,
}

impl StoredObject {
    /// Length of the bytes actually read, which wins over `record.size`.
    pub fn content_length(&self) -> u64 {
        self.data.len() as u64
    }
}
