//! Flat CSV metadata tables.
//!
//! Every table is read fully into memory, mutated, and written back as a
//! whole. Writes go to a temporary sibling file which is synced and then
//! renamed over the table, so a reader never sees a half-written table.
//!
//! A table must start with its exact header row. Any malformed row (wrong
//! column count, unparseable field) fails the whole load with
//! [`StorageError::Metadata`]; rows are never skipped or defaulted.

pub mod bucket_index;
pub mod object_index;

use crate::services::storage_service::{StorageError, StorageResult};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// A row type stored in a metadata table.
pub trait TableRow: Serialize + DeserializeOwned {
    /// Exact header row of the table.
    const HEADER: &'static [&'static str];

    /// Unique key of the row within its table.
    fn key(&self) -> &str;
}

/// In-memory copy of one table file, in on-disk row order.
#[derive(Debug)]
pub struct Table<R> {
    path: PathBuf,
    rows: Vec<R>,
}

impl<R: TableRow> Table<R> {
    /// A table with no rows. Nothing is written until [`Table::persist`].
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    /// Read and parse the table at `path`.
    pub async fn load(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let raw = fs::read(&path)
            .await
            .map_err(|err| StorageError::metadata(&path, format!("could not read: {err}")))?;
        let rows = decode::<R>(&raw).map_err(|reason| StorageError::metadata(&path, reason))?;
        Ok(Self { path, rows })
    }

    /// Rewrite the whole table from the in-memory rows.
    pub async fn persist(&self) -> StorageResult<()> {
        let bytes = encode(&self.rows)
            .map_err(|err| StorageError::metadata(&self.path, format!("could not encode: {err}")))?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|err| StorageError::metadata(&self.path, format!("could not write: {err}")))?;
        debug!("rewrote {} ({} rows)", self.path.display(), self.rows.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn find(&self, key: &str) -> Option<&R> {
        self.rows.iter().find(|row| row.key() == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut R> {
        self.rows.iter_mut().find(|row| row.key() == key)
    }

    /// Replace the row with the same key in place, or append it.
    /// Returns the replaced row.
    pub fn upsert(&mut self, row: R) -> Option<R> {
        match self.rows.iter().position(|existing| existing.key() == row.key()) {
            Some(pos) => Some(std::mem::replace(&mut self.rows[pos], row)),
            None => {
                self.rows.push(row);
                None
            }
        }
    }

    /// Remove the row with `key`; false if there was none.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.key() != key);
        self.rows.len() != before
    }
}

fn decode<R: TableRow>(raw: &[u8]) -> Result<Vec<R>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw);

    let headers = reader
        .headers()
        .map_err(|err| format!("unreadable header: {err}"))?;
    if !headers.iter().eq(R::HEADER.iter().copied()) {
        return Err(format!(
            "expected header `{}`, found `{}`",
            R::HEADER.join(","),
            headers.iter().collect::<Vec<_>>().join(",")
        ));
    }

    reader
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(|err| format!("invalid row: {err}"))
}

fn encode<R: TableRow>(rows: &[R]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(R::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Write `bytes` to a temporary file next to `path`, sync it and rename it
/// over `path`. The temporary file is removed if any step fails.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = temp_sibling(path);
    let result = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        if let Err(err) = fs::remove_file(&tmp_path).await {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("failed to remove temp file {}: {}", tmp_path.display(), err);
            }
        }
    }
    result
}

/// `<dir>/.tmp-<uuid>` in the same directory as `path`, so the final rename
/// never crosses a filesystem boundary.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".tmp-{}", Uuid::new_v4()))
}
