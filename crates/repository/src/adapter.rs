//! The generic repository adapter.

use std::marker::PhantomData;
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, Entity, ExecutionContext};
use janus_storage::{Pagination, RecordStore, StorageError, StoredRow};

/// Maps between a domain entity and its storage row. One implementation
/// per entity type; the only component allowed to translate between the
/// two representations.
pub trait RowMapper<T: Entity, R: StoredRow>: Send + Sync {
    /// Build a brand-new row from a validated entity.
    fn to_row(&self, entity: &T) -> R;

    /// Copy the entity's current field values onto an already-fetched
    /// row, leaving the row's version column untouched; the version
    /// used for the write is the one the fetched row carries.
    fn apply(&self, entity: &T, row: &mut R);

    /// Trusted reconstruction of an entity from a stored row. No
    /// re-validation: whatever was persisted was valid when written.
    fn materialize(&self, row: &R) -> T;
}

/// Handler fed one materialized entity at a time during enumeration,
/// with its zero-based ordinal. Returns whether to continue.
pub type EntityHandler<'a, T> = &'a mut (dyn FnMut(&ExecutionContext, T, u64) -> bool + Send);

/// Generic repository over an entity type, its row type, and a storage
/// collaborator.
///
/// Writes follow the read-verify-write protocol: `update` and `delete`
/// first read the currently stored row and hand the version *of that
/// read* to the store's conditional write. The two round trips are not
/// atomic; a concurrent writer landing between them is caught by the
/// store's version check, which this adapter only supplies the expected
/// value for.
pub struct EntityRepository<T, R, S, M> {
    store: Arc<S>,
    mapper: M,
    entity_name: &'static str,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R, S, M> EntityRepository<T, R, S, M>
where
    T: Entity,
    R: StoredRow,
    S: RecordStore<R>,
    M: RowMapper<T, R>,
{
    /// `entity_name` prefixes the diagnostic codes this adapter emits
    /// (`<entity_name>.Version.Conflict` and friends).
    pub fn new(store: Arc<S>, mapper: M, entity_name: &'static str) -> Self {
        Self {
            store,
            mapper,
            entity_name,
            _marker: PhantomData,
        }
    }

    /// The storage collaborator, for per-entity finders built beside
    /// this adapter.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub async fn get_by_id(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<T>, StorageError> {
        let row = self.store.get_by_id(ctx, id, cancel).await?;
        Ok(row.map(|r| self.mapper.materialize(&r)))
    }

    pub async fn exists(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.store.exists(ctx, id, cancel).await
    }

    /// Persist a freshly registered entity. A duplicate id is a
    /// business outcome, not an error.
    pub async fn register_new(
        &self,
        ctx: &ExecutionContext,
        entity: &T,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        let row = self.mapper.to_row(entity);
        match self.store.insert(ctx, row, cancel).await {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyExists { id }) => {
                ctx.add_error(
                    format!("{}.Id.AlreadyExists", self.entity_name),
                    format!("{} {id} is already registered", self.entity_name),
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Read-verify-write update. Returns `Ok(false)` with a diagnostic
    /// when the row no longer exists or another writer got there first.
    pub async fn update(
        &self,
        ctx: &ExecutionContext,
        entity: &T,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        let id = entity.info().id;
        let Some(mut row) = self.store.get_by_id(ctx, id, cancel).await? else {
            self.note_not_found(ctx, id);
            return Ok(false);
        };
        // The expected version comes from the read we just did, never
        // from the entity the caller handed us.
        let expected_version = row.row_version();
        self.mapper.apply(entity, &mut row);
        match self.store.update(ctx, row, expected_version, cancel).await {
            Ok(_new_version) => Ok(true),
            Err(StorageError::Conflict { .. }) => {
                self.note_conflict(ctx, id, expected_version);
                Ok(false)
            }
            Err(StorageError::NotFound { .. }) => {
                self.note_not_found(ctx, id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Read-verify-write delete, same shape as [`Self::update`].
    pub async fn delete(
        &self,
        ctx: &ExecutionContext,
        entity: &T,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        let id = entity.info().id;
        let Some(row) = self.store.get_by_id(ctx, id, cancel).await? else {
            self.note_not_found(ctx, id);
            return Ok(false);
        };
        let expected_version = row.row_version();
        match self.store.delete(ctx, id, expected_version, cancel).await {
            Ok(()) => Ok(true),
            Err(StorageError::Conflict { .. }) => {
                self.note_conflict(ctx, id, expected_version);
                Ok(false)
            }
            Err(StorageError::NotFound { .. }) => {
                self.note_not_found(ctx, id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Feed one page of entities to `handler`, early-stopping when it
    /// returns false. Propagates the scan's success flag unchanged.
    pub async fn enumerate_all(
        &self,
        ctx: &ExecutionContext,
        pagination: Pagination,
        handler: EntityHandler<'_, T>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        let mapper = &self.mapper;
        let mut row_handler =
            |row: &R, ordinal: u64| handler(ctx, mapper.materialize(row), ordinal);
        self.store
            .enumerate_all(ctx, pagination, &mut row_handler, cancel)
            .await
    }

    /// Feed every entity modified at or after `since` to `handler`, in
    /// modified-at order. The incremental half of the change feed.
    pub async fn enumerate_modified_since(
        &self,
        ctx: &ExecutionContext,
        since: OffsetDateTime,
        handler: EntityHandler<'_, T>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        let mapper = &self.mapper;
        let mut row_handler =
            |row: &R, ordinal: u64| handler(ctx, mapper.materialize(row), ordinal);
        self.store
            .enumerate_modified_since(ctx, since, &mut row_handler, cancel)
            .await
    }

    fn note_not_found(&self, ctx: &ExecutionContext, id: Uuid) {
        tracing::debug!(entity = self.entity_name, %id, "write target no longer exists");
        ctx.add_warning(
            format!("{}.Id.NotFound", self.entity_name),
            format!("{} {id} no longer exists", self.entity_name),
        );
    }

    fn note_conflict(&self, ctx: &ExecutionContext, id: Uuid, expected_version: i64) {
        tracing::warn!(entity = self.entity_name, %id, expected_version,
            "concurrent write rejected");
        ctx.add_error(
            format!("{}.Version.Conflict", self.entity_name),
            format!(
                "{} {id} was changed by another operation (expected version {expected_version})",
                self.entity_name
            ),
        );
    }
}
