//! Persistence for [`UserConsent`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, Entity, ExecutionContext, UserConsent};
use janus_storage::{
    check_cancelled, Pagination, RecordStore, SelectRows, StorageError, StoredRow,
};

use crate::adapter::{EntityHandler, EntityRepository, RowMapper};
use crate::columns::InfoColumns;

/// Storage row mirroring [`UserConsent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRow {
    #[serde(flatten)]
    pub info: InfoColumns,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub scope: String,
    pub is_revoked: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

impl StoredRow for ConsentRow {
    fn row_id(&self) -> Uuid {
        self.info.id
    }

    fn row_version(&self) -> i64 {
        self.info.version
    }

    fn set_row_version(&mut self, version: i64) {
        self.info.version = version;
    }

    fn modified_at(&self) -> OffsetDateTime {
        self.info.modified_at()
    }
}

/// Entity ⇄ row translation for consents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentMapper;

impl RowMapper<UserConsent, ConsentRow> for ConsentMapper {
    fn to_row(&self, entity: &UserConsent) -> ConsentRow {
        ConsentRow {
            info: InfoColumns::from_info(entity.info()),
            user_id: entity.user_id(),
            client_id: entity.client_id(),
            scope: entity.scope().to_owned(),
            is_revoked: entity.is_revoked(),
            revoked_at: entity.revoked_at(),
        }
    }

    fn apply(&self, entity: &UserConsent, row: &mut ConsentRow) {
        let stored_version = row.info.version;
        row.info = InfoColumns::from_info(entity.info());
        row.info.version = stored_version;
        row.user_id = entity.user_id();
        row.client_id = entity.client_id();
        row.scope = entity.scope().to_owned();
        row.is_revoked = entity.is_revoked();
        row.revoked_at = entity.revoked_at();
    }

    fn materialize(&self, row: &ConsentRow) -> UserConsent {
        UserConsent::materialize(
            row.info.to_info(),
            row.user_id,
            row.client_id,
            row.scope.clone(),
            row.is_revoked,
            row.revoked_at,
        )
    }
}

/// Storage collaborator for consent rows.
#[async_trait]
pub trait ConsentStore: RecordStore<ConsentRow> {
    /// The consent a user holds for a client, revoked or not.
    async fn find_for_user_client(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        client_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<ConsentRow>, StorageError>;

    /// All unrevoked consents granted by `user_id`.
    async fn find_granted_for_user(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<ConsentRow>, StorageError>;
}

#[async_trait]
impl<S> ConsentStore for S
where
    S: RecordStore<ConsentRow> + SelectRows<ConsentRow>,
{
    async fn find_for_user_client(
        &self,
        _ctx: &ExecutionContext,
        user_id: Uuid,
        client_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<ConsentRow>, StorageError> {
        check_cancelled(cancel)?;
        Ok(self
            .select(&|r: &ConsentRow| r.user_id == user_id && r.client_id == client_id)
            .into_iter()
            .next())
    }

    async fn find_granted_for_user(
        &self,
        _ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<ConsentRow>, StorageError> {
        check_cancelled(cancel)?;
        Ok(self.select(&|r: &ConsentRow| r.user_id == user_id && !r.is_revoked))
    }
}

/// Repository for [`UserConsent`].
pub struct ConsentRepository<S> {
    inner: EntityRepository<UserConsent, ConsentRow, S, ConsentMapper>,
}

impl<S: ConsentStore> ConsentRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inner: EntityRepository::new(store, ConsentMapper, "UserConsent"),
        }
    }

    pub async fn get_by_id(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<UserConsent>, StorageError> {
        self.inner.get_by_id(ctx, id, cancel).await
    }

    pub async fn exists(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.exists(ctx, id, cancel).await
    }

    pub async fn register_new(
        &self,
        ctx: &ExecutionContext,
        consent: &UserConsent,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.register_new(ctx, consent, cancel).await
    }

    pub async fn update(
        &self,
        ctx: &ExecutionContext,
        consent: &UserConsent,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.update(ctx, consent, cancel).await
    }

    pub async fn delete(
        &self,
        ctx: &ExecutionContext,
        consent: &UserConsent,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.delete(ctx, consent, cancel).await
    }

    pub async fn enumerate_all(
        &self,
        ctx: &ExecutionContext,
        pagination: Pagination,
        handler: EntityHandler<'_, UserConsent>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.enumerate_all(ctx, pagination, handler, cancel).await
    }

    pub async fn enumerate_modified_since(
        &self,
        ctx: &ExecutionContext,
        since: OffsetDateTime,
        handler: EntityHandler<'_, UserConsent>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner
            .enumerate_modified_since(ctx, since, handler, cancel)
            .await
    }

    pub async fn find_for_user_client(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        client_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<UserConsent>, StorageError> {
        let row = self
            .inner
            .store()
            .find_for_user_client(ctx, user_id, client_id, cancel)
            .await?;
        Ok(row.map(|r| self.inner.mapper().materialize(&r)))
    }

    pub async fn find_granted_for_user(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<UserConsent>, StorageError> {
        let rows = self
            .inner
            .store()
            .find_granted_for_user(ctx, user_id, cancel)
            .await?;
        Ok(rows
            .iter()
            .map(|r| self.inner.mapper().materialize(r))
            .collect())
    }
}
