//! JSON-file backend.
//!
//! Rows live in one JSON document (an array of rows), loaded fully at
//! open and rewritten atomically after every mutation via a temp file
//! in the same directory. Suits the small administrative collections
//! this boundary manages; it is not a database.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, ExecutionContext};

use crate::error::StorageError;
use crate::pagination::Pagination;
use crate::row::StoredRow;
use crate::traits::{check_cancelled, RecordStore, RowHandler, SelectRows};

/// [`RecordStore`] persisting rows as a JSON document on disk, with the
/// same version discipline as [`MemoryStore`](crate::MemoryStore).
#[derive(Debug)]
pub struct JsonFileStore<R> {
    path: PathBuf,
    rows: Mutex<BTreeMap<Uuid, R>>,
}

impl<R> JsonFileStore<R>
where
    R: StoredRow + Serialize + DeserializeOwned,
{
    /// Open the store at `path`, loading existing rows. A missing file
    /// is an empty store; the file is created on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let rows = if path.exists() {
            let file = File::open(&path).map_err(backend)?;
            let loaded: Vec<R> = serde_json::from_reader(BufReader::new(file)).map_err(backend)?;
            loaded.into_iter().map(|r| (r.row_id(), r)).collect()
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), "opened json file store");
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Uuid, R>> {
        self.rows.lock().expect("file store lock poisoned")
    }

    /// Rewrite the document atomically: serialize to a temp file in the
    /// target directory, then rename over the old document.
    fn save(&self, rows: &BTreeMap<Uuid, R>) -> Result<(), StorageError> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
        .map_err(backend)?;
        let ordered: Vec<&R> = rows.values().collect();
        serde_json::to_writer_pretty(&mut tmp, &ordered).map_err(backend)?;
        tmp.flush().map_err(backend)?;
        tmp.persist(&self.path).map_err(backend)?;
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl<R> RecordStore<R> for JsonFileStore<R>
where
    R: StoredRow + Serialize + DeserializeOwned + 'static,
{
    async fn get_by_id(
        &self,
        _ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<R>, StorageError> {
        check_cancelled(cancel)?;
        Ok(self.lock().get(&id).cloned())
    }

    async fn exists(
        &self,
        _ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        check_cancelled(cancel)?;
        Ok(self.lock().contains_key(&id))
    }

    async fn insert(
        &self,
        _ctx: &ExecutionContext,
        mut row: R,
        cancel: &CancelToken,
    ) -> Result<(), StorageError> {
        check_cancelled(cancel)?;
        let mut rows = self.lock();
        let id = row.row_id();
        if rows.contains_key(&id) {
            return Err(StorageError::AlreadyExists { id });
        }
        row.set_row_version(1);
        rows.insert(id, row);
        self.save(&rows)
    }

    async fn update(
        &self,
        _ctx: &ExecutionContext,
        mut row: R,
        expected_version: i64,
        cancel: &CancelToken,
    ) -> Result<i64, StorageError> {
        check_cancelled(cancel)?;
        let mut rows = self.lock();
        let id = row.row_id();
        let current = rows.get(&id).ok_or(StorageError::NotFound { id })?;
        if current.row_version() != expected_version {
            tracing::debug!(%id, expected_version, current = current.row_version(),
                "rejecting stale update");
            return Err(StorageError::Conflict {
                id,
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        row.set_row_version(new_version);
        rows.insert(id, row);
        self.save(&rows)?;
        Ok(new_version)
    }

    async fn delete(
        &self,
        _ctx: &ExecutionContext,
        id: Uuid,
        expected_version: i64,
        cancel: &CancelToken,
    ) -> Result<(), StorageError> {
        check_cancelled(cancel)?;
        let mut rows = self.lock();
        let current = rows.get(&id).ok_or(StorageError::NotFound { id })?;
        if current.row_version() != expected_version {
            return Err(StorageError::Conflict {
                id,
                expected_version,
            });
        }
        rows.remove(&id);
        self.save(&rows)
    }

    async fn enumerate_all(
        &self,
        _ctx: &ExecutionContext,
        pagination: Pagination,
        handler: RowHandler<'_, R>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        check_cancelled(cancel)?;
        let page: Vec<R> = self
            .lock()
            .values()
            .skip(pagination.offset() as usize)
            .take(pagination.page_size() as usize)
            .cloned()
            .collect();
        for (ordinal, row) in page.iter().enumerate() {
            check_cancelled(cancel)?;
            if !handler(row, ordinal as u64) {
                break;
            }
        }
        Ok(true)
    }

    async fn enumerate_modified_since(
        &self,
        _ctx: &ExecutionContext,
        since: OffsetDateTime,
        handler: RowHandler<'_, R>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        check_cancelled(cancel)?;
        let mut changed: Vec<R> = self
            .lock()
            .values()
            .filter(|r| r.modified_at() >= since)
            .cloned()
            .collect();
        changed.sort_by_key(|r| (r.modified_at(), r.row_id()));
        for (ordinal, row) in changed.iter().enumerate() {
            check_cancelled(cancel)?;
            if !handler(row, ordinal as u64) {
                break;
            }
        }
        Ok(true)
    }
}

impl<R> SelectRows<R> for JsonFileStore<R>
where
    R: StoredRow + Serialize + DeserializeOwned,
{
    fn select(&self, pred: &dyn Fn(&R) -> bool) -> Vec<R> {
        self.lock().values().filter(|r| pred(r)).cloned().collect()
    }
}
