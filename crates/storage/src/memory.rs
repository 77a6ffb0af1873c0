//! In-memory reference backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, ExecutionContext};

use crate::error::StorageError;
use crate::pagination::Pagination;
use crate::row::StoredRow;
use crate::traits::{check_cancelled, RecordStore, RowHandler, SelectRows};

/// [`RecordStore`] backed by a mutex-guarded map. The test double for
/// everything above this crate, and the reference semantics durable
/// backends are held to by the conformance suite.
#[derive(Debug)]
pub struct MemoryStore<R> {
    rows: Mutex<BTreeMap<Uuid, R>>,
}

impl<R> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: StoredRow> MemoryStore<R> {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Uuid, R>> {
        self.rows.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl<R: StoredRow + 'static> RecordStore<R> for MemoryStore<R> {
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
        Ok(())
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
        Ok(())
    }

    async fn enumerate_all(
        &self,
        _ctx: &ExecutionContext,
        pagination: Pagination,
        handler: RowHandler<'_, R>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        check_cancelled(cancel)?;
        // Clone the page out so the handler runs without the lock held.
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

impl<R: StoredRow> SelectRows<R> for MemoryStore<R> {
    fn select(&self, pred: &dyn Fn(&R) -> bool) -> Vec<R> {
        self.lock().values().filter(|r| pred(r)).cloned().collect()
    }
}
