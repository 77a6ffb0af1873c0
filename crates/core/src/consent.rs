//! Consent granted by a user to a service client for a scope.
//!
//! Built on the same registration protocol as
//! [`OneTimeToken`](crate::OneTimeToken): validated construction,
//! clone-then-transition mutation, audit stamping. Lifecycle:
//! `Granted → Revoked` (terminal).

use time::OffsetDateTime;
use uuid::Uuid;

use crate::check;
use crate::context::ExecutionContext;
use crate::entity::{Entity, EntityInfo};

const SCOPE_MAX: usize = 256;

/// Candidate field values for [`UserConsent::register_new`].
#[derive(Debug, Clone)]
pub struct NewUserConsent {
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub scope: String,
}

/// A user's consent for a client to act within a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserConsent {
    info: EntityInfo,
    user_id: Uuid,
    client_id: Uuid,
    scope: String,
    is_revoked: bool,
    revoked_at: Option<OffsetDateTime>,
}

impl UserConsent {
    /// Validate and register a granted consent.
    pub fn register_new(ctx: &ExecutionContext, input: NewUserConsent) -> Option<Self> {
        if !Self::is_valid(ctx, input.user_id, input.client_id, &input.scope) {
            return None;
        }
        Some(Self {
            info: EntityInfo::register_new(ctx),
            user_id: input.user_id,
            client_id: input.client_id,
            scope: input.scope,
            is_revoked: false,
            revoked_at: None,
        })
    }

    /// Pure validation of candidate fields.
    pub fn is_valid(
        ctx: &ExecutionContext,
        user_id: Uuid,
        client_id: Uuid,
        scope: &str,
    ) -> bool {
        check::all([
            check::not_nil(ctx, "UserConsent.UserId", user_id),
            check::not_nil(ctx, "UserConsent.ClientId", client_id),
            check::required(ctx, "UserConsent.Scope", scope)
                && check::max_length(ctx, "UserConsent.Scope", scope, SCOPE_MAX),
        ])
    }

    /// Register the revocation transition on a clone of `self`. Fails
    /// with `UserConsent.IsRevoked.AlreadyRevoked` when already revoked.
    pub fn register_revoke(&self, ctx: &ExecutionContext) -> Option<Self> {
        let mut next = self.clone();
        if next.is_revoked {
            ctx.add_error(
                "UserConsent.IsRevoked.AlreadyRevoked",
                "consent has already been revoked",
            );
            return None;
        }
        next.is_revoked = true;
        next.revoked_at = Some(ctx.now());
        next.info.stamp_changed(ctx);
        Some(next)
    }

    /// Trusted reconstruction from a stored record.
    pub fn materialize(
        info: EntityInfo,
        user_id: Uuid,
        client_id: Uuid,
        scope: String,
        is_revoked: bool,
        revoked_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            info,
            user_id,
            client_id,
            scope,
            is_revoked,
            revoked_at,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_revoked(&self) -> bool {
        self.is_revoked
    }

    pub fn revoked_at(&self) -> Option<OffsetDateTime> {
        self.revoked_at
    }
}

impl Entity for UserConsent {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::clock::FixedClock;
    use crate::context::TenantInfo;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            TenantInfo::new(Uuid::new_v4(), "acme"),
            "alice",
            "unit-test",
            "UserConsent.Test",
        )
        .with_clock(Arc::new(FixedClock(NOW)))
    }

    fn valid_input() -> NewUserConsent {
        NewUserConsent {
            user_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            scope: "profile:read".to_owned(),
        }
    }

    #[test]
    fn register_new_grants_consent() {
        let ctx = ctx();
        let consent = UserConsent::register_new(&ctx, valid_input()).expect("valid input");
        assert!(!consent.is_revoked());
        assert_eq!(consent.scope(), "profile:read");
        assert_eq!(consent.info().created_at, NOW);
    }

    #[test]
    fn register_new_reports_all_invalid_fields() {
        let ctx = ctx();
        let input = NewUserConsent {
            user_id: Uuid::nil(),
            client_id: Uuid::nil(),
            scope: String::new(),
        };

        assert!(UserConsent::register_new(&ctx, input).is_none());
        assert!(ctx.has_message("UserConsent.UserId.IsRequired"));
        assert!(ctx.has_message("UserConsent.ClientId.IsRequired"));
        assert!(ctx.has_message("UserConsent.Scope.IsRequired"));
        assert_eq!(ctx.messages().len(), 3);
    }

    #[test]
    fn scope_length_is_bounded() {
        let ctx = ctx();
        let mut input = valid_input();
        input.scope = "s".repeat(300);
        assert!(UserConsent::register_new(&ctx, input).is_none());
        assert!(ctx.has_message("UserConsent.Scope.MaxLength"));
    }

    #[test]
    fn revoke_is_terminal() {
        let ctx = ctx();
        let consent = UserConsent::register_new(&ctx, valid_input()).unwrap();

        let revoked = consent.register_revoke(&ctx).expect("first revoke");
        assert!(revoked.is_revoked());
        assert_eq!(revoked.revoked_at(), Some(NOW));
        assert_eq!(revoked.info().version, consent.info().version + 1);
        assert!(!consent.is_revoked());

        assert!(revoked.register_revoke(&ctx).is_none());
        assert!(ctx.has_message("UserConsent.IsRevoked.AlreadyRevoked"));
    }
}
