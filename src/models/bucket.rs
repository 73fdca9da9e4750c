//! Represents a logical bucket, a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a bucket row. Only `Active` buckets are visible.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketStatus {
    Active,
    Deleted,
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStatus::Active => "Active",
            BucketStatus::Deleted => "Deleted",
        }
    }
}

/// One row of the root-level bucket table (`buckets.csv`).
///
/// A bucket is a directory under the storage root. The row is the
/// authoritative record of its existence; the directory holds the content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BucketRecord {
    /// Bucket name; unique among `Active` rows.
    pub name: String,

    /// When this bucket was created.
    #[serde(with = "super::timestamp")]
    pub creation_time: DateTime<Utc>,

    /// When the bucket or any object inside it last changed.
    #[serde(with = "super::timestamp")]
    pub last_modified_time: DateTime<Utc>,

    /// Active or Deleted (tombstone).
    pub status: BucketStatus,
}

impl BucketRecord {
    /// A fresh `Active` record created at `now`.
    pub fn active(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_time: now,
            last_modified_time: now,
            status: BucketStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BucketStatus::Active
    }
}
