//! src/services/storage_service.rs
//!
//! StorageService: the six bucket/object operations, backed by CSV metadata
//! tables and plain files beneath `base_path`:
//!
//! ```text
//! base_path/buckets.csv            bucket table
//! base_path/{bucket}/objects.csv   object table of one bucket
//! base_path/{bucket}/{key}         object payload
//! ```
//!
//! Every operation loads the tables it needs from disk, mutates them in
//! memory and rewrites them before returning. Physical state (directories,
//! files) is created before the row that refers to it, so a failure part way
//! never leaves a row pointing at nothing.

use crate::{
    index::{
        bucket_index::BucketIndex,
        object_index::{OBJECT_INDEX_FILE, ObjectIndex},
    },
    models::{
        self,
        bucket::BucketRecord,
        object::{ObjectRecord, StoredObject},
    },
    services::{
        object_store::{ObjectStore, ensure_key_safe},
        validation::{NameViolation, validate_bucket_name},
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{Stream, stream};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs,
    sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock},
};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket name `{name}` is invalid: {reason}")]
    InvalidBucketName { name: String, reason: NameViolation },
    #[error("object key `{key}` is invalid: {reason}")]
    InvalidObjectKey { key: String, reason: &'static str },
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("bucket `{0}` is not empty")]
    BucketNotEmpty(String),
    #[error("`{0}` is reserved for bucket metadata")]
    ReservedKey(String),
    #[error("metadata table `{}`: {reason}", .path.display())]
    Metadata { path: PathBuf, reason: String },
    #[error("could not create bucket `{name}`: {source}")]
    BucketCreation { name: String, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn metadata(path: &Path, reason: impl Into<String>) -> Self {
        StorageError::Metadata {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Locks over the shared tables.
///
/// Acquisition order is always bucket lock, then table lock.
#[derive(Debug, Default)]
struct Locks {
    /// Guards `buckets.csv`.
    bucket_table: RwLock<()>,
    /// One lock per bucket name, guarding its `objects.csv` and directory.
    /// Entries live only while some operation holds or awaits them.
    buckets: DashMap<String, Arc<RwLock<()>>>,
}

/// A held bucket lock. Dropping the last lease of a bucket removes its map
/// entry.
struct BucketLease<G> {
    locks: Arc<Locks>,
    bucket: String,
    guard: Option<G>,
}

impl<G> Drop for BucketLease<G> {
    fn drop(&mut self) {
        self.guard.take();
        // the map holds one reference; anything above that is another lease
        self.locks
            .buckets
            .remove_if(self.bucket.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// StorageService provides basic S3-like operations:
/// - List, create and delete buckets (rows in `buckets.csv` + directories)
/// - Put, get and delete objects (rows in `objects.csv` + files)
///
/// Cloning is cheap; clones share the same locks, so every handler of one
/// process serializes writers per table.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Root directory holding the bucket table and bucket directories.
    pub base_path: PathBuf,

    store: ObjectStore,
    locks: Arc<Locks>,
}

impl StorageService {
    /// Create a new StorageService rooted at `base_path`. Call
    /// [`StorageService::init`] before serving requests.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            store: ObjectStore::new(base_path.clone()),
            base_path,
            locks: Arc::new(Locks::default()),
        }
    }

    /// Create the root directory and a header-only bucket table when missing.
    pub async fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|err| {
            StorageError::metadata(&self.base_path, format!("could not create storage root: {err}"))
        })?;
        BucketIndex::ensure_exists(&self.base_path).await
    }

    fn lease<G>(&self, bucket: &str) -> (BucketLease<G>, Arc<RwLock<()>>) {
        let lock = self
            .locks
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .clone();
        let lease = BucketLease {
            locks: Arc::clone(&self.locks),
            bucket: bucket.to_string(),
            guard: None,
        };
        (lease, lock)
    }

    async fn read_bucket(&self, bucket: &str) -> BucketLease<OwnedRwLockReadGuard<()>> {
        let (mut lease, lock) = self.lease(bucket);
        lease.guard = Some(lock.read_owned().await);
        lease
    }

    async fn write_bucket(&self, bucket: &str) -> BucketLease<OwnedRwLockWriteGuard<()>> {
        let (mut lease, lock) = self.lease(bucket);
        lease.guard = Some(lock.write_owned().await);
        lease
    }

    /// Names that could never have been created cannot exist; they are
    /// answered without allocating a lock for them.
    fn ensure_bucket_name_plausible(bucket: &str) -> StorageResult<()> {
        validate_bucket_name(bucket).map_err(|_| StorageError::BucketNotFound(bucket.to_string()))
    }

    /// Fail with `BucketNotFound` unless `bucket` has an Active row.
    /// Caller must hold the bucket lock.
    async fn ensure_bucket_active(&self, bucket: &str) -> StorageResult<()> {
        let _table = self.locks.bucket_table.read().await;
        let index = BucketIndex::load(&self.base_path).await?;
        match index.find_active(bucket) {
            Some(_) => Ok(()),
            None => Err(StorageError::BucketNotFound(bucket.to_string())),
        }
    }

    /// Bump the bucket's `LastModifiedTime` and rewrite the bucket table.
    async fn touch_bucket(&self, bucket: &str, now: DateTime<Utc>) -> StorageResult<()> {
        let _table = self.locks.bucket_table.write().await;
        let mut index = BucketIndex::load(&self.base_path).await?;
        if index.touch_last_modified(bucket, now) {
            index.persist().await?;
        }
        Ok(())
    }

    /// All Active buckets in stored order.
    pub async fn list_buckets(&self) -> StorageResult<Vec<BucketRecord>> {
        let _table = self.locks.bucket_table.read().await;
        let index = BucketIndex::load(&self.base_path).await?;
        Ok(index.list_active())
    }

    /// Create a bucket and initialize its directory.
    ///
    /// - Validates the name (`InvalidBucketName`)
    /// - Rejects names held by an Active row or an existing directory
    ///   (`BucketAlreadyExists`)
    /// - Creates the directory (`BucketCreation`) and its empty object table
    /// - Registers the Active row last
    ///
    /// If a step after the directory exists fails, the directory is removed
    /// again and the bucket is not registered.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<BucketRecord> {
        validate_bucket_name(name).map_err(|reason| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason,
        })?;

        let _bucket = self.write_bucket(name).await;
        let _table = self.locks.bucket_table.write().await;

        let mut index = BucketIndex::load(&self.base_path).await?;
        let record = index.create(name, models::now())?;

        let bucket_dir = self.store.bucket_dir(name);
        match fs::try_exists(&bucket_dir).await {
            Ok(false) => {}
            Ok(true) => return Err(StorageError::BucketAlreadyExists(name.to_string())),
            Err(source) => {
                return Err(StorageError::BucketCreation {
                    name: name.to_string(),
                    source,
                });
            }
        }
        fs::create_dir(&bucket_dir).await.map_err(|source| {
            if source.kind() == ErrorKind::AlreadyExists {
                StorageError::BucketAlreadyExists(name.to_string())
            } else {
                StorageError::BucketCreation {
                    name: name.to_string(),
                    source,
                }
            }
        })?;

        let registered = async {
            ObjectIndex::create_empty(&bucket_dir).await?;
            index.persist().await
        }
        .await;
        if let Err(err) = registered {
            discard_dir(&bucket_dir).await;
            return Err(err);
        }

        info!("created bucket {}", name);
        Ok(record)
    }

    /// Delete an empty bucket.
    ///
    /// - `BucketNotFound` without an Active row
    /// - `BucketNotEmpty` while its object table has rows
    /// - Removes the object table, then the directory, then marks the row
    ///   Deleted
    ///
    /// A step that fails puts back what the earlier steps removed, so the
    /// bucket either disappears completely or stays fully usable.
    pub async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        Self::ensure_bucket_name_plausible(name)?;
        let _bucket = self.write_bucket(name).await;
        let _table = self.locks.bucket_table.write().await;

        let mut index = BucketIndex::load(&self.base_path).await?;
        if index.find_active(name).is_none() {
            return Err(StorageError::BucketNotFound(name.to_string()));
        }

        let bucket_dir = self.store.bucket_dir(name);
        let objects = ObjectIndex::load(&bucket_dir).await?;
        if !objects.is_empty() {
            return Err(StorageError::BucketNotEmpty(name.to_string()));
        }

        fs::remove_file(objects.path()).await.map_err(|err| {
            StorageError::metadata(objects.path(), format!("could not remove: {err}"))
        })?;

        if let Err(err) = fs::remove_dir(&bucket_dir).await {
            restore_empty_bucket(&bucket_dir, false).await;
            return Err(StorageError::Io(err));
        }

        index.mark_deleted(name, models::now());
        if let Err(err) = index.persist().await {
            restore_empty_bucket(&bucket_dir, true).await;
            return Err(err);
        }

        info!("deleted bucket {}", name);
        Ok(())
    }

    /// Fetch an object's bytes and its record.
    ///
    /// The returned length is that of the bytes actually read; a stale `Size`
    /// in the table is logged and otherwise ignored. A listed object whose
    /// file is gone is an `Io` failure, not `ObjectNotFound`.
    pub async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        Self::ensure_bucket_name_plausible(bucket)?;
        let _bucket = self.read_bucket(bucket).await;
        self.ensure_bucket_active(bucket).await?;
        if key == OBJECT_INDEX_FILE {
            return Err(StorageError::ReservedKey(key.to_string()));
        }

        let objects = ObjectIndex::load(&self.store.bucket_dir(bucket)).await?;
        let record = objects
            .find(key)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        let data = match self.store.read(bucket, key).await {
            Ok(data) => data,
            Err(StorageError::ObjectNotFound { .. }) => {
                return Err(StorageError::Io(io::Error::new(
                    ErrorKind::NotFound,
                    format!("content of listed object {bucket}/{key} is missing"),
                )));
            }
            Err(err) => return Err(err),
        };
        if data.len() as u64 != record.size {
            warn!(
                "size of {}/{} is {} bytes, table says {}",
                bucket,
                key,
                data.len(),
                record.size
            );
        }
        Ok(StoredObject { record, data })
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<ObjectRecord> {
        self.put_object_stream(bucket, key, content_type, stream::once(async { Ok(body) }))
            .await
    }

    /// Stream-upload an object to disk and update metadata.
    ///
    /// - `BucketNotFound`, then `ReservedKey` for the table filename, then
    ///   `InvalidObjectKey` for keys over 1024 bytes or unsafe as a filename
    /// - Writes the content (`Io` on failure)
    /// - Upserts the row: size is the number of bytes written, the content
    ///   type defaults to `text/plain`
    /// - Bumps the bucket's `LastModifiedTime`, then rewrites the object table
    ///
    /// An existing key is fully replaced. When either table cannot be
    /// rewritten, a file created by this call is removed again and the object
    /// table keeps its previous rows.
    pub async fn put_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: S,
    ) -> StorageResult<ObjectRecord>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        Self::ensure_bucket_name_plausible(bucket)?;
        let _bucket = self.write_bucket(bucket).await;
        self.ensure_bucket_active(bucket).await?;
        if key == OBJECT_INDEX_FILE {
            return Err(StorageError::ReservedKey(key.to_string()));
        }
        ensure_key_safe(key)?;

        let mut objects = ObjectIndex::load(&self.store.bucket_dir(bucket)).await?;
        let replacing = objects.find(key).is_some();

        let size = self.store.write_stream(bucket, key, body).await?;
        let now = models::now();
        let record = ObjectRecord::new(key, size, content_type, now);
        objects.upsert(record.clone());

        let registered = async {
            self.touch_bucket(bucket, now).await?;
            objects.persist().await
        }
        .await;
        if let Err(err) = registered {
            if !replacing {
                if let Err(cleanup) = self.store.delete(bucket, key).await {
                    warn!("failed to remove unregistered object {}/{}: {}", bucket, key, cleanup);
                }
            }
            return Err(err);
        }

        debug!("put {}/{} ({} bytes, {})", bucket, key, size, record.content_type);
        Ok(record)
    }

    /// Delete an object and its row.
    ///
    /// The file is moved aside first and only removed once the bucket's
    /// `LastModifiedTime` is bumped and the object table no longer lists it;
    /// if either table cannot be rewritten the file is put back.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectRecord> {
        Self::ensure_bucket_name_plausible(bucket)?;
        let _bucket = self.write_bucket(bucket).await;
        self.ensure_bucket_active(bucket).await?;
        if key == OBJECT_INDEX_FILE {
            return Err(StorageError::ReservedKey(key.to_string()));
        }

        let mut objects = ObjectIndex::load(&self.store.bucket_dir(bucket)).await?;
        let record = objects
            .find(key)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        let detached = self.store.detach(bucket, key).await?;
        objects.remove(key);
        let unregistered = async {
            self.touch_bucket(bucket, models::now()).await?;
            objects.persist().await
        }
        .await;
        if let Err(err) = unregistered {
            if let Some(detached) = detached {
                if let Err(restore) = detached.restore().await {
                    warn!("failed to restore {}/{}: {}", bucket, key, restore);
                }
            }
            return Err(err);
        }
        if let Some(detached) = detached {
            if let Err(err) = detached.discard().await {
                warn!("left orphaned content for {}/{}: {}", bucket, key, err);
            }
        }

        debug!("deleted {}/{}", bucket, key);
        Ok(record)
    }
}

/// Best-effort removal of a bucket directory whose registration failed.
async fn discard_dir(bucket_dir: &Path) {
    if let Err(err) = fs::remove_dir_all(bucket_dir).await {
        if err.kind() != ErrorKind::NotFound {
            warn!(
                "failed to remove unregistered bucket directory {}: {}",
                bucket_dir.display(),
                err
            );
        }
    }
}

/// Best-effort rebuild of an empty bucket after a failed deletion.
async fn restore_empty_bucket(bucket_dir: &Path, recreate_dir: bool) {
    if recreate_dir {
        if let Err(err) = fs::create_dir(bucket_dir).await {
            warn!("failed to recreate {}: {}", bucket_dir.display(), err);
            return;
        }
    }
    if let Err(err) = ObjectIndex::create_empty(bucket_dir).await {
        warn!("failed to restore object table in {}: {}", bucket_dir.display(), err);
    }
}
