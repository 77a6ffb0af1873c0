use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, ExecutionContext};

use crate::error::StorageError;
use crate::pagination::Pagination;
use crate::row::StoredRow;

/// Handler fed one row at a time during enumeration, together with the
/// row's zero-based ordinal within the scan. Returns whether the scan
/// should continue.
pub type RowHandler<'a, R> = &'a mut (dyn FnMut(&R, u64) -> bool + Send);

/// Guard to call at every I/O boundary before touching the backend.
pub fn check_cancelled(cancel: &CancelToken) -> Result<(), StorageError> {
    if cancel.is_cancelled() {
        return Err(StorageError::Cancelled);
    }
    Ok(())
}

/// The storage collaborator contract for one row type.
///
/// Implementations perform the actual persistence I/O and are the sole
/// enforcers of the optimistic-concurrency check: a write carrying an
/// `expected_version` that no longer matches the stored row MUST fail
/// with [`StorageError::Conflict`] and leave the row untouched. The
/// comparison has to be atomic with the write; the repository adapter
/// above only supplies the version it last observed.
///
/// Version discipline: `insert` stores the row at version 1 regardless
/// of the version the row object carries; `update` stores
/// `expected_version + 1` and returns it.
///
/// Every method takes the operation's [`ExecutionContext`] and a
/// [`CancelToken`] checked at each I/O boundary.
#[async_trait]
pub trait RecordStore<R: StoredRow>: Send + Sync {
    async fn get_by_id(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<R>, StorageError>;

    async fn exists(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError>;

    /// Insert a new row. Fails with [`StorageError::AlreadyExists`] if
    /// the id is already present.
    async fn insert(
        &self,
        ctx: &ExecutionContext,
        row: R,
        cancel: &CancelToken,
    ) -> Result<(), StorageError>;

    /// Conditional update: applied only if the stored version equals
    /// `expected_version`, otherwise [`StorageError::Conflict`].
    /// Returns the new version on success.
    async fn update(
        &self,
        ctx: &ExecutionContext,
        row: R,
        expected_version: i64,
        cancel: &CancelToken,
    ) -> Result<i64, StorageError>;

    /// Conditional delete under the same version contract as `update`.
    async fn delete(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        expected_version: i64,
        cancel: &CancelToken,
    ) -> Result<(), StorageError>;

    /// Feed the rows of one page to `handler` in stable id order,
    /// stopping early when the handler returns `false`. Returns whether
    /// the scan itself succeeded.
    async fn enumerate_all(
        &self,
        ctx: &ExecutionContext,
        pagination: Pagination,
        handler: RowHandler<'_, R>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError>;

    /// Feed every row modified at or after `since` to `handler`,
    /// ordered by modified-at then id, stopping early when the handler
    /// returns `false`.
    async fn enumerate_modified_since(
        &self,
        ctx: &ExecutionContext,
        since: OffsetDateTime,
        handler: RowHandler<'_, R>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError>;
}

/// Synchronous predicate scan over all rows of a backend.
///
/// The entity-specific finders (by hash, by owner, by user+client) are
/// built on this in backends that hold their rows locally; a real
/// database backend would translate those finders to queries instead.
pub trait SelectRows<R>: Send + Sync {
    /// All rows matching `pred`, in stable id order.
    fn select(&self, pred: &dyn Fn(&R) -> bool) -> Vec<R>;
}
