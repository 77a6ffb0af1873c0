//! Single-use expiring token, the exemplar Janus entity.
//!
//! Lifecycle: `Active → Consumed` (via [`OneTimeToken::register_mark_used`],
//! terminal) or `Active → Expired` (derived from the expiry instant,
//! never stored). The entity stores only the hash of the token value;
//! producing that hash is the caller's concern.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::check;
use crate::context::ExecutionContext;
use crate::entity::{Entity, EntityInfo};

const TOKEN_HASH_MIN: usize = 16;
const TOKEN_HASH_MAX: usize = 512;

/// Candidate field values for [`OneTimeToken::register_new`].
#[derive(Debug, Clone)]
pub struct NewOneTimeToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Observable lifecycle state, derived from the stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Consumed,
    Expired,
}

/// A token that may be consumed exactly once before its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeToken {
    info: EntityInfo,
    user_id: Uuid,
    token_hash: String,
    expires_at: OffsetDateTime,
    is_used: bool,
    used_at: Option<OffsetDateTime>,
}

impl OneTimeToken {
    /// Validate the candidate fields and register a new active token.
    ///
    /// All field validators run even when an earlier one fails, so the
    /// context ends up with one message per invalid field. Returns
    /// `None` without constructing anything if any field is invalid.
    pub fn register_new(ctx: &ExecutionContext, input: NewOneTimeToken) -> Option<Self> {
        if !Self::is_valid(ctx, input.user_id, &input.token_hash, input.expires_at) {
            return None;
        }
        Some(Self {
            info: EntityInfo::register_new(ctx),
            user_id: input.user_id,
            token_hash: input.token_hash,
            expires_at: input.expires_at,
            is_used: false,
            used_at: None,
        })
    }

    /// Pure validation of candidate fields, usable without constructing.
    pub fn is_valid(
        ctx: &ExecutionContext,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> bool {
        let now = ctx.now();
        check::all([
            check::not_nil(ctx, "OneTimeToken.UserId", user_id),
            check::length_between(
                ctx,
                "OneTimeToken.TokenHash",
                token_hash,
                TOKEN_HASH_MIN,
                TOKEN_HASH_MAX,
            ),
            check::in_future(ctx, "OneTimeToken.ExpiresAt", expires_at, now),
        ])
    }

    /// Register the consumption transition on a clone of `self`.
    ///
    /// Fails with `OneTimeToken.IsUsed.AlreadyUsed` when the token was
    /// already consumed; `self` is never touched either way. Expiry is
    /// deliberately not checked here; enforcing it is the caller's
    /// concern.
    pub fn register_mark_used(&self, ctx: &ExecutionContext) -> Option<Self> {
        let mut next = self.clone();
        if next.is_used {
            ctx.add_error(
                "OneTimeToken.IsUsed.AlreadyUsed",
                "token has already been consumed",
            );
            return None;
        }
        next.is_used = true;
        next.used_at = Some(ctx.now());
        next.info.stamp_changed(ctx);
        Some(next)
    }

    /// Trusted reconstruction from a stored record. No re-validation:
    /// whatever was persisted was valid when it was written.
    #[allow(clippy::too_many_arguments)]
    pub fn materialize(
        info: EntityInfo,
        user_id: Uuid,
        token_hash: String,
        expires_at: OffsetDateTime,
        is_used: bool,
        used_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            info,
            user_id,
            token_hash,
            expires_at,
            is_used,
            used_at,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn used_at(&self) -> Option<OffsetDateTime> {
        self.used_at
    }

    /// State as observed at `now`. Consumption wins over expiry.
    pub fn state(&self, now: OffsetDateTime) -> TokenState {
        if self.is_used {
            TokenState::Consumed
        } else if now > self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}

impl Entity for OneTimeToken {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::clock::FixedClock;
    use crate::context::TenantInfo;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn ctx_at(instant: OffsetDateTime) -> ExecutionContext {
        ExecutionContext::new(
            TenantInfo::new(Uuid::new_v4(), "acme"),
            "alice",
            "unit-test",
            "OneTimeToken.Test",
        )
        .with_clock(Arc::new(FixedClock(instant)))
    }

    fn valid_input() -> NewOneTimeToken {
        NewOneTimeToken {
            user_id: Uuid::new_v4(),
            token_hash: "c29tZS1oYXNoLXZhbHVlLWxvbmctZW5vdWdo".to_owned(),
            expires_at: NOW + Duration::hours(24),
        }
    }

    #[test]
    fn register_new_stamps_creation_audit_from_context() {
        let ctx = ctx_at(NOW);
        let input = valid_input();
        let token = OneTimeToken::register_new(&ctx, input.clone()).expect("valid input");

        assert_eq!(token.user_id(), input.user_id);
        assert_eq!(token.token_hash(), input.token_hash);
        assert!(!token.is_used());
        assert!(token.used_at().is_none());
        assert_eq!(token.info().created_by, "alice");
        assert_eq!(token.info().created_at, NOW);
        assert_eq!(token.info().created_correlation_id, ctx.correlation_id());
        assert_eq!(token.info().tenant, *ctx.tenant());
        assert_eq!(token.state(NOW), TokenState::Active);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn register_new_reports_missing_hash() {
        let ctx = ctx_at(NOW);
        let mut input = valid_input();
        input.token_hash = String::new();

        assert!(OneTimeToken::register_new(&ctx, input).is_none());
        assert!(ctx.has_message("OneTimeToken.TokenHash.IsRequired"));
    }

    #[test]
    fn register_new_reports_every_invalid_field() {
        let ctx = ctx_at(NOW);
        let input = NewOneTimeToken {
            user_id: Uuid::nil(),
            token_hash: "short".to_owned(),
            expires_at: NOW - Duration::hours(1),
        };

        assert!(OneTimeToken::register_new(&ctx, input).is_none());
        // No cross-field short-circuit: all three failures are present.
        assert!(ctx.has_message("OneTimeToken.UserId.IsRequired"));
        assert!(ctx.has_message("OneTimeToken.TokenHash.MinLength"));
        assert!(ctx.has_message("OneTimeToken.ExpiresAt.NotInFuture"));
        assert_eq!(ctx.messages().len(), 3);
    }

    #[test]
    fn mark_used_consumes_once_and_only_once() {
        let ctx = ctx_at(NOW);
        let token = OneTimeToken::register_new(&ctx, valid_input()).unwrap();

        let used_instant = NOW + Duration::hours(1);
        let consume_ctx = ctx_at(used_instant);
        let used = token.register_mark_used(&consume_ctx).expect("first use");
        assert!(used.is_used());
        assert_eq!(used.used_at(), Some(used_instant));
        assert_eq!(used.state(used_instant), TokenState::Consumed);
        assert_eq!(used.info().last_changed_by.as_deref(), Some("alice"));
        assert_eq!(used.info().version, token.info().version + 1);
        // The original is untouched.
        assert!(!token.is_used());

        let again_ctx = ctx_at(used_instant);
        let denied = used.register_mark_used(&again_ctx);
        assert!(denied.is_none());
        assert!(again_ctx.has_message("OneTimeToken.IsUsed.AlreadyUsed"));
        // Failed transition mutated nothing.
        assert!(used.is_used());
        assert_eq!(used.used_at(), Some(used_instant));
    }

    #[test]
    fn mark_used_ignores_expiry() {
        let ctx = ctx_at(NOW);
        let token = OneTimeToken::register_new(&ctx, valid_input()).unwrap();

        let late = NOW + Duration::hours(48);
        let late_ctx = ctx_at(late);
        assert_eq!(token.state(late), TokenState::Expired);
        // Expiry enforcement belongs to the caller, not the transition.
        assert!(token.register_mark_used(&late_ctx).is_some());
    }

    #[test]
    fn expiry_is_derived_not_stored() {
        let ctx = ctx_at(NOW);
        let token = OneTimeToken::register_new(&ctx, valid_input()).unwrap();

        assert_eq!(token.state(NOW), TokenState::Active);
        assert_eq!(
            token.state(token.expires_at() + Duration::seconds(1)),
            TokenState::Expired
        );
        // Boundary: exactly at the expiry instant the token is still active.
        assert_eq!(token.state(token.expires_at()), TokenState::Active);
    }

    #[test]
    fn is_valid_does_not_construct() {
        let ctx = ctx_at(NOW);
        assert!(OneTimeToken::is_valid(
            &ctx,
            Uuid::new_v4(),
            "c29tZS1oYXNoLXZhbHVlLWxvbmctZW5vdWdo",
            NOW + Duration::hours(1),
        ));
        assert!(!OneTimeToken::is_valid(
            &ctx,
            Uuid::nil(),
            "c29tZS1oYXNoLXZhbHVlLWxvbmctZW5vdWdo",
            NOW + Duration::hours(1),
        ));
    }
}
