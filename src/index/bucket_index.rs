//! Root-level bucket table (`<root>/buckets.csv`).
//!
//! Deletion keeps the row as a `Deleted` tombstone. A later create with the
//! same name replaces the tombstone in place, so each name has one row.

use super::{Table, TableRow};
use crate::{
    models::bucket::{BucketRecord, BucketStatus},
    services::storage_service::{StorageError, StorageResult},
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Filename of the bucket table inside the storage root.
pub const BUCKET_INDEX_FILE: &str = "buckets.csv";

impl TableRow for BucketRecord {
    const HEADER: &'static [&'static str] = &["Name", "CreationTime", "LastModifiedTime", "Status"];

    fn key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct BucketIndex {
    table: Table<BucketRecord>,
}

impl BucketIndex {
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(BUCKET_INDEX_FILE)
    }

    pub async fn load(root: &Path) -> StorageResult<Self> {
        Ok(Self {
            table: Table::load(Self::path_in(root)).await?,
        })
    }

    /// Write a header-only bucket table if `root` has none yet.
    pub async fn ensure_exists(root: &Path) -> StorageResult<()> {
        let path = Self::path_in(root);
        match fs::try_exists(&path).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                Table::<BucketRecord>::empty(&path).persist().await?;
                info!("initialized bucket table at {}", path.display());
                Ok(())
            }
            Err(err) => Err(StorageError::metadata(&path, format!("could not stat: {err}"))),
        }
    }

    /// Every row, tombstones included, in stored order.
    pub fn list(&self) -> &[BucketRecord] {
        self.table.rows()
    }

    /// Active rows in stored order.
    pub fn list_active(&self) -> Vec<BucketRecord> {
        self.table
            .rows()
            .iter()
            .filter(|record| record.is_active())
            .cloned()
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&BucketRecord> {
        self.table.find(name)
    }

    pub fn find_active(&self, name: &str) -> Option<&BucketRecord> {
        self.find(name).filter(|record| record.is_active())
    }

    /// Register a new `Active` bucket. Fails with `BucketAlreadyExists` when an
    /// `Active` row with that name exists; a `Deleted` row is replaced.
    pub fn create(&mut self, name: &str, now: DateTime<Utc>) -> StorageResult<BucketRecord> {
        if self.find_active(name).is_some() {
            return Err(StorageError::BucketAlreadyExists(name.to_string()));
        }
        let record = BucketRecord::active(name, now);
        self.table.upsert(record.clone());
        Ok(record)
    }

    pub fn upsert(&mut self, record: BucketRecord) -> Option<BucketRecord> {
        self.table.upsert(record)
    }

    /// Physically drop a row, tombstone or not. Bucket deletion itself goes
    /// through [`BucketIndex::mark_deleted`].
    pub fn remove(&mut self, name: &str) -> bool {
        self.table.remove(name)
    }

    /// Flip an `Active` row to `Deleted`; false if no active row exists.
    pub fn mark_deleted(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        match self.table.find_mut(name) {
            Some(record) if record.is_active() => {
                record.status = BucketStatus::Deleted;
                record.last_modified_time = now;
                true
            }
            _ => false,
        }
    }

    /// Bump the modification time of an `Active` bucket; false if none exists.
    pub fn touch_last_modified(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        match self.table.find_mut(name) {
            Some(record) if record.is_active() => {
                record.last_modified_time = now;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table.rows().is_empty()
    }

    pub async fn persist(&self) -> StorageResult<()> {
        self.table.persist().await
    }
}
