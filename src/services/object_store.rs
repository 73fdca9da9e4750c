//! Object payloads on disk: `root/{bucket}/{key}`.
//!
//! Keys map to a single file directly inside the bucket directory, so a key
//! must be one plain path segment. Anything that could resolve elsewhere
//! (separators, `.`/`..`, control bytes) is rejected before a path is built.

use crate::index::{object_index::OBJECT_INDEX_FILE, temp_sibling};
use crate::services::storage_service::{StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;

/// Longest accepted object key, in bytes.
pub const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Physical directory of a bucket. Does not check for existence.
    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Physical path of an object, after checking the key cannot escape the
    /// bucket directory or reach the object table.
    pub fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        ensure_key_safe(key)?;
        if key == OBJECT_INDEX_FILE {
            return Err(StorageError::ReservedKey(key.to_string()));
        }
        Ok(self.bucket_dir(bucket).join(key))
    }

    /// Stream bytes into a temporary file, sync it and rename it over the
    /// object path, replacing any prior content. Returns the byte count.
    pub async fn write_stream<S>(&self, bucket: &str, key: &str, body: S) -> StorageResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let file_path = self.object_path(bucket, key)?;
        let tmp_path = temp_sibling(&file_path);

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            let mut size: u64 = 0;
            pin_mut!(body);
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                size += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await?;
            Ok::<_, io::Error>(size)
        }
        .await;

        match result {
            Ok(size) => {
                debug!("stored {} ({} bytes)", file_path.display(), size);
                Ok(size)
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(StorageError::Io(err))
            }
        }
    }

    pub async fn write(&self, bucket: &str, key: &str, bytes: Bytes) -> StorageResult<u64> {
        self.write_stream(bucket, key, stream::once(async { Ok(bytes) }))
            .await
    }

    pub async fn read(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let file_path = self.object_path(bucket, key)?;
        match fs::read(&file_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Remove an object file. Already-absent files count as removed.
    pub async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let file_path = self.object_path(bucket, key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
        Ok(())
    }

    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let file_path = self.object_path(bucket, key)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    /// Move an object file aside so its removal can still be undone.
    /// Returns `None` when there is no file to move.
    pub async fn detach(&self, bucket: &str, key: &str) -> StorageResult<Option<Detached>> {
        let original = self.object_path(bucket, key)?;
        let parked = temp_sibling(&original);
        match fs::rename(&original, &parked).await {
            Ok(()) => Ok(Some(Detached { original, parked })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// An object file moved aside by [`ObjectStore::detach`].
#[derive(Debug)]
#[must_use = "a detached object must be restored or discarded"]
pub struct Detached {
    original: PathBuf,
    parked: PathBuf,
}

impl Detached {
    /// Put the file back under its key.
    pub async fn restore(self) -> io::Result<()> {
        fs::rename(&self.parked, &self.original).await
    }

    /// Remove the parked file for good.
    pub async fn discard(self) -> io::Result<()> {
        fs::remove_file(&self.parked).await?;
        debug!("removed physical file {}", self.original.display());
        Ok(())
    }
}

/// Reject keys that are not a single, plain path segment.
pub fn ensure_key_safe(key: &str) -> StorageResult<()> {
    let reason = if key.is_empty() {
        "must not be empty"
    } else if key.len() > MAX_OBJECT_KEY_LEN {
        "must be at most 1024 bytes"
    } else if key == "." || key == ".." {
        "must not be a relative path segment"
    } else if key.contains('/') || key.contains('\\') {
        "must not contain path separators"
    } else if key.bytes().any(|b| b.is_ascii_control()) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidObjectKey {
        key: truncate_for_message(key),
        reason,
    })
}

fn truncate_for_message(key: &str) -> String {
    const SHOWN: usize = 64;
    match key.char_indices().nth(SHOWN) {
        Some((idx, _)) => format!("{}...", &key[..idx]),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_bucket() -> (ObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bkt")).unwrap();
        (ObjectStore::new(dir.path()), dir)
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        let long = "k".repeat(MAX_OBJECT_KEY_LEN + 1);
        for key in ["", ".", "..", "../escape", "a/b", "a\\b", "nul\0byte", long.as_str()] {
            assert!(
                matches!(ensure_key_safe(key), Err(StorageError::InvalidObjectKey { .. })),
                "{key:?}"
            );
        }
        let longest = "k".repeat(MAX_OBJECT_KEY_LEN);
        assert!(ensure_key_safe(&longest).is_ok());
        assert!(ensure_key_safe("..hidden").is_ok());
        assert!(ensure_key_safe("report.final.pdf").is_ok());
    }

    #[test]
    fn index_file_is_not_addressable() {
        let store = ObjectStore::new("/srv/data");
        assert!(matches!(
            store.object_path("bkt", OBJECT_INDEX_FILE),
            Err(StorageError::ReservedKey(_))
        ));
        assert_eq!(
            store.object_path("bkt", "a.txt").unwrap(),
            PathBuf::from("/srv/data/bkt/a.txt")
        );
    }

    #[tokio::test]
    async fn write_truncates_previous_content() {
        let (store, _dir) = store_with_bucket();
        assert_eq!(store.write("bkt", "a", Bytes::from("longer body")).await.unwrap(), 11);
        assert_eq!(store.write("bkt", "a", Bytes::from("hi")).await.unwrap(), 2);
        assert_eq!(store.read("bkt", "a").await.unwrap(), Bytes::from("hi"));
    }

    #[tokio::test]
    async fn write_stream_counts_all_chunks() {
        let (store, dir) = store_with_bucket();
        let chunks = stream::iter(vec![
            Ok(Bytes::from("ab")),
            Ok(Bytes::from("cde")),
            Ok(Bytes::new()),
        ]);
        assert_eq!(store.write_stream("bkt", "multi", chunks).await.unwrap(), 5);
        assert_eq!(std::fs::read(dir.path().join("bkt/multi")).unwrap(), b"abcde");
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_file() {
        let (store, dir) = store_with_bucket();
        let chunks = stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(io::Error::other("client went away")),
        ]);
        let err = store.write_stream("bkt", "broken", chunks).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(std::fs::read_dir(dir.path().join("bkt")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn read_missing_is_not_found_and_delete_is_idempotent() {
        let (store, _dir) = store_with_bucket();
        assert!(matches!(
            store.read("bkt", "nope").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        store.delete("bkt", "nope").await.unwrap();

        store.write("bkt", "gone", Bytes::from("x")).await.unwrap();
        assert!(store.exists("bkt", "gone").await.unwrap());
        store.delete("bkt", "gone").await.unwrap();
        store.delete("bkt", "gone").await.unwrap();
        assert!(!store.exists("bkt", "gone").await.unwrap());
    }

    #[tokio::test]
    async fn detached_objects_can_be_restored_or_discarded() {
        let (store, dir) = store_with_bucket();
        store.write("bkt", "keep", Bytes::from("1")).await.unwrap();
        store.write("bkt", "drop", Bytes::from("2")).await.unwrap();

        let keep = store.detach("bkt", "keep").await.unwrap().unwrap();
        assert!(!store.exists("bkt", "keep").await.unwrap());
        keep.restore().await.unwrap();
        assert_eq!(store.read("bkt", "keep").await.unwrap(), Bytes::from("1"));

        let dropped = store.detach("bkt", "drop").await.unwrap().unwrap();
        dropped.discard().await.unwrap();
        assert!(!store.exists("bkt", "drop").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path().join("bkt")).unwrap().count(), 1);

        assert!(store.detach("bkt", "never").await.unwrap().is_none());
    }
}
