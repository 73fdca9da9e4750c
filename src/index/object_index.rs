//! Per-bucket object table (`<bucket>/objects.csv`).

use super::{Table, TableRow};
use crate::{models::object::ObjectRecord, services::storage_service::StorageResult};
use std::path::{Path, PathBuf};

/// Reserved filename of the object table inside every bucket directory.
/// It can never be used as an object key.
pub const OBJECT_INDEX_FILE: &str = "objects.csv";

impl TableRow for ObjectRecord {
    const HEADER: &'static [&'static str] = &["ObjectKey", "Size", "ContentType", "LastModified"];

    fn key(&self) -> &str {
        &self.key
    }
}

/// The object records of one bucket, scoped to a single request.
///
/// Mutations only touch memory; callers must [`ObjectIndex::persist`] before
/// returning.
#[derive(Debug)]
pub struct ObjectIndex {
    table: Table<ObjectRecord>,
}

impl ObjectIndex {
    pub fn path_in(bucket_dir: &Path) -> PathBuf {
        bucket_dir.join(OBJECT_INDEX_FILE)
    }

    pub async fn load(bucket_dir: &Path) -> StorageResult<Self> {
        Ok(Self {
            table: Table::load(Self::path_in(bucket_dir)).await?,
        })
    }

    /// Write a header-only table into `bucket_dir`.
    pub async fn create_empty(bucket_dir: &Path) -> StorageResult<Self> {
        let index = Self {
            table: Table::empty(Self::path_in(bucket_dir)),
        };
        index.persist().await?;
        Ok(index)
    }

    pub fn list(&self) -> &[ObjectRecord] {
        self.table.rows()
    }

    pub fn find(&self, key: &str) -> Option<&ObjectRecord> {
        self.table.find(key)
    }

    /// Insert or fully replace the record for `record.key`.
    pub fn upsert(&mut self, record: ObjectRecord) -> Option<ObjectRecord> {
        self.table.upsert(record)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.table.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.table.rows().is_empty()
    }

    pub fn path(&self) -> &Path {
        self.table.path()
    }

    pub async fn persist(&self) -> StorageResult<()> {
        self.table.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::now, services::storage_service::StorageError};

    #[tokio::test]
    async fn empty_index_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let index = ObjectIndex::create_empty(dir.path()).await.unwrap();
        assert!(index.is_empty());

        let raw = std::fs::read_to_string(dir.path().join(OBJECT_INDEX_FILE)).unwrap();
        assert_eq!(raw, "ObjectKey,Size,ContentType,LastModified\n");
    }

    #[tokio::test]
    async fn upsert_overwrites_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = ObjectIndex::create_empty(dir.path()).await.unwrap();
        let at = now();

        index.upsert(ObjectRecord::new("a.txt", 2, None, at));
        index.upsert(ObjectRecord::new("b.bin", 9, Some("application/octet-stream"), at));
        index.upsert(ObjectRecord::new("a.txt", 5, Some("text/html"), at));
        index.persist().await.unwrap();

        let reloaded = ObjectIndex::load(dir.path()).await.unwrap();
        let keys: Vec<_> = reloaded.list().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["a.txt", "b.bin"]);
        let a = reloaded.find("a.txt").unwrap();
        assert_eq!(a.size, 5);
        assert_eq!(a.content_type, "text/html");
        assert_eq!(a.last_modified, at);
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = ObjectIndex::create_empty(dir.path()).await.unwrap();
        index.upsert(ObjectRecord::new("k", 1, None, now()));

        assert!(index.remove("k"));
        assert!(!index.remove("k"));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn corrupt_rows_are_metadata_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(OBJECT_INDEX_FILE),
            "ObjectKey,Size,ContentType,LastModified\nk,-3,text/plain,2024-01-01T00-00-00\n",
        )
        .unwrap();

        let err = ObjectIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Metadata { .. }));
    }
}
