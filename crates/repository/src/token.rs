//! Persistence for [`OneTimeToken`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{CancelToken, Entity, ExecutionContext, OneTimeToken};
use janus_storage::{
    check_cancelled, Pagination, RecordStore, SelectRows, StorageError, StoredRow,
};

use crate::adapter::{EntityHandler, EntityRepository, RowMapper};
use crate::columns::InfoColumns;

/// Storage row mirroring [`OneTimeToken`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRow {
    #[serde(flatten)]
    pub info: InfoColumns,
    pub user_id: Uuid,
    pub token_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub is_used: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub used_at: Option<OffsetDateTime>,
}

impl StoredRow for TokenRow {
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

/// Entity ⇄ row translation for tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMapper;

impl RowMapper<OneTimeToken, TokenRow> for TokenMapper {
    fn to_row(&self, entity: &OneTimeToken) -> TokenRow {
        TokenRow {
            info: InfoColumns::from_info(entity.info()),
            user_id: entity.user_id(),
            token_hash: entity.token_hash().to_owned(),
            expires_at: entity.expires_at(),
            is_used: entity.is_used(),
            used_at: entity.used_at(),
        }
    }

    fn apply(&self, entity: &OneTimeToken, row: &mut TokenRow) {
        let stored_version = row.info.version;
        row.info = InfoColumns::from_info(entity.info());
        row.info.version = stored_version;
        row.user_id = entity.user_id();
        row.token_hash = entity.token_hash().to_owned();
        row.expires_at = entity.expires_at();
        row.is_used = entity.is_used();
        row.used_at = entity.used_at();
    }

    fn materialize(&self, row: &TokenRow) -> OneTimeToken {
        OneTimeToken::materialize(
            row.info.to_info(),
            row.user_id,
            row.token_hash.clone(),
            row.expires_at,
            row.is_used,
            row.used_at,
        )
    }
}

/// Storage collaborator for token rows: the generic contract plus the
/// token-specific lookups.
#[async_trait]
pub trait TokenStore: RecordStore<TokenRow> {
    /// The row storing exactly this hash, if any.
    async fn find_by_hash(
        &self,
        ctx: &ExecutionContext,
        token_hash: &str,
        cancel: &CancelToken,
    ) -> Result<Option<TokenRow>, StorageError>;

    /// Unconsumed, unexpired tokens owned by `user_id`, judged against
    /// the context clock.
    async fn find_active_for_user(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<TokenRow>, StorageError>;
}

/// Any backend that can scan its rows locally gets the token finders
/// for free; a database-backed store implements the trait directly and
/// translates each finder to a query.
#[async_trait]
impl<S> TokenStore for S
where
    S: RecordStore<TokenRow> + SelectRows<TokenRow>,
{
    async fn find_by_hash(
        &self,
        _ctx: &ExecutionContext,
        token_hash: &str,
        cancel: &CancelToken,
    ) -> Result<Option<TokenRow>, StorageError> {
        check_cancelled(cancel)?;
        Ok(self
            .select(&|r: &TokenRow| r.token_hash == token_hash)
            .into_iter()
            .next())
    }

    async fn find_active_for_user(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<TokenRow>, StorageError> {
        check_cancelled(cancel)?;
        let now = ctx.now();
        Ok(self.select(&|r: &TokenRow| r.user_id == user_id && !r.is_used && r.expires_at > now))
    }
}

/// Repository for [`OneTimeToken`]: the generic adapter plus the token
/// finders, exposed entity-typed.
pub struct TokenRepository<S> {
    inner: EntityRepository<OneTimeToken, TokenRow, S, TokenMapper>,
}

impl<S: TokenStore> TokenRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inner: EntityRepository::new(store, TokenMapper, "OneTimeToken"),
        }
    }

    pub async fn get_by_id(
        &self,
        ctx: &ExecutionContext,
        id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Option<OneTimeToken>, StorageError> {
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
        token: &OneTimeToken,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.register_new(ctx, token, cancel).await
    }

    pub async fn update(
        &self,
        ctx: &ExecutionContext,
        token: &OneTimeToken,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.update(ctx, token, cancel).await
    }

    pub async fn delete(
        &self,
        ctx: &ExecutionContext,
        token: &OneTimeToken,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.delete(ctx, token, cancel).await
    }

    pub async fn enumerate_all(
        &self,
        ctx: &ExecutionContext,
        pagination: Pagination,
        handler: EntityHandler<'_, OneTimeToken>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner.enumerate_all(ctx, pagination, handler, cancel).await
    }

    pub async fn enumerate_modified_since(
        &self,
        ctx: &ExecutionContext,
        since: OffsetDateTime,
        handler: EntityHandler<'_, OneTimeToken>,
        cancel: &CancelToken,
    ) -> Result<bool, StorageError> {
        self.inner
            .enumerate_modified_since(ctx, since, handler, cancel)
            .await
    }

    pub async fn find_by_hash(
        &self,
        ctx: &ExecutionContext,
        token_hash: &str,
        cancel: &CancelToken,
    ) -> Result<Option<OneTimeToken>, StorageError> {
        let row = self
            .inner
            .store()
            .find_by_hash(ctx, token_hash, cancel)
            .await?;
        Ok(row.map(|r| self.inner.mapper().materialize(&r)))
    }

    pub async fn find_active_for_user(
        &self,
        ctx: &ExecutionContext,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<Vec<OneTimeToken>, StorageError> {
        let rows = self
            .inner
            .store()
            .find_active_for_user(ctx, user_id, cancel)
            .await?;
        Ok(rows
            .iter()
            .map(|r| self.inner.mapper().materialize(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use janus_core::{FixedClock, NewOneTimeToken, TenantInfo};

    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            TenantInfo::new(Uuid::new_v4(), "acme"),
            "alice",
            "unit-test",
            "OneTimeToken.Map",
        )
        .with_clock(Arc::new(FixedClock(datetime!(2025-06-01 12:00 UTC))))
    }

    fn token(ctx: &ExecutionContext) -> OneTimeToken {
        OneTimeToken::register_new(
            ctx,
            NewOneTimeToken {
                user_id: Uuid::new_v4(),
                token_hash: "c29tZS1oYXNoLXZhbHVlLWxvbmctZW5vdWdo".to_owned(),
                expires_at: datetime!(2025-06-02 12:00 UTC),
            },
        )
        .expect("valid token")
    }

    #[test]
    fn row_round_trips_every_field() {
        let ctx = ctx();
        let original = token(&ctx);
        let consumed = original
            .register_mark_used(&ctx)
            .expect("fresh token consumes");

        for entity in [original, consumed] {
            let row = TokenMapper.to_row(&entity);
            let back = TokenMapper.materialize(&row);
            // Audit metadata and the version token survive unchanged.
            assert_eq!(back, entity);
        }
    }

    #[test]
    fn apply_preserves_the_fetched_version() {
        let ctx = ctx();
        let entity = token(&ctx);
        let mut row = TokenMapper.to_row(&entity);
        row.info.version = 7;

        let consumed = entity.register_mark_used(&ctx).unwrap();
        TokenMapper.apply(&consumed, &mut row);

        assert!(row.is_used);
        assert_eq!(row.info.last_changed_by.as_deref(), Some("alice"));
        // The row keeps the version it was fetched with; the entity's
        // own version never lands in storage.
        assert_eq!(row.info.version, 7);
    }

    #[test]
    fn row_serializes_flat() {
        let ctx = ctx();
        let row = TokenMapper.to_row(&token(&ctx));
        let json = serde_json::to_value(&row).expect("serializable");
        // Flattened audit columns sit beside the entity fields.
        assert!(json.get("created_by").is_some());
        assert!(json.get("token_hash").is_some());
        assert_eq!(json["version"], 1);
        assert_eq!(json["expires_at"], "2025-06-02T12:00:00Z");

        let back: TokenRow = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, row);
    }

    #[tokio::test]
    async fn finders_respect_consumption_and_expiry() {
        use janus_storage::MemoryStore;

        let ctx = ctx();
        let cancel = CancelToken::new();
        let store = Arc::new(MemoryStore::<TokenRow>::new());
        let repo = TokenRepository::new(store);

        let user_id = Uuid::new_v4();
        let mk = |hash: &str, expires_at| {
            OneTimeToken::register_new(
                &ctx,
                NewOneTimeToken {
                    user_id,
                    token_hash: hash.to_owned(),
                    expires_at,
                },
            )
            .expect("valid token")
        };

        let active = mk("hash-active-0123456789", datetime!(2025-06-02 12:00 UTC));
        let expiring = mk("hash-expiring-0123456789", datetime!(2025-06-01 12:30 UTC));
        let consumed = mk("hash-consumed-0123456789", datetime!(2025-06-02 12:00 UTC))
            .register_mark_used(&ctx)
            .unwrap();
        for t in [&active, &expiring, &consumed] {
            assert!(repo.register_new(&ctx, t, &cancel).await.unwrap());
        }

        let found = repo
            .find_by_hash(&ctx, "hash-active-0123456789", &cancel)
            .await
            .unwrap()
            .expect("hash lookup hits");
        assert_eq!(found.info().id, active.info().id);

        // Judged at the context clock (12:00): both unconsumed tokens
        // are still active.
        let actives = repo.find_active_for_user(&ctx, user_id, &cancel).await.unwrap();
        assert_eq!(actives.len(), 2);

        // A later clock ages the 12:30 expiry out.
        let later_ctx = ExecutionContext::new(
            TenantInfo::new(Uuid::new_v4(), "acme"),
            "alice",
            "unit-test",
            "OneTimeToken.Map",
        )
        .with_clock(Arc::new(FixedClock(
            datetime!(2025-06-01 12:30 UTC) + Duration::seconds(1),
        )));
        let actives = repo
            .find_active_for_user(&later_ctx, user_id, &cancel)
            .await
            .unwrap();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].info().id, active.info().id);
    }
}
