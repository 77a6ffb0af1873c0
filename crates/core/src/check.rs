//! Field validators used by entity registration paths.
//!
//! Each validator covers one field, appends at most one coded error to
//! the context, and returns whether the field passed. Checks for a
//! single field stop at the first failure (a missing value makes its
//! length meaningless); validators for *different* fields must all run
//! so the caller sees every invalid field at once. Combine their
//! results with [`all`], never with `&&`.
//!
//! Message codes are `<Entity>.<Field>.<Kind>`; validators receive the
//! `<Entity>.<Field>` subject and append the kind.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::context::ExecutionContext;

/// Eager conjunction over already-evaluated validator results.
///
/// Every element of `results` was produced before this call, so every
/// validator has already run and reported; the fold merely combines
/// the outcomes.
pub fn all<const N: usize>(results: [bool; N]) -> bool {
    results.into_iter().fold(true, |acc, ok| acc & ok)
}

/// Non-empty (after trimming) string field.
pub fn required(ctx: &ExecutionContext, subject: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        ctx.add_error(
            format!("{subject}.IsRequired"),
            format!("{subject} must be provided"),
        );
        return false;
    }
    true
}

/// Minimum length in characters. Assumes presence was checked first.
pub fn min_length(ctx: &ExecutionContext, subject: &str, value: &str, min: usize) -> bool {
    if value.chars().count() < min {
        ctx.add_error(
            format!("{subject}.MinLength"),
            format!("{subject} must be at least {min} characters"),
        );
        return false;
    }
    true
}

/// Maximum length in characters.
pub fn max_length(ctx: &ExecutionContext, subject: &str, value: &str, max: usize) -> bool {
    if value.chars().count() > max {
        ctx.add_error(
            format!("{subject}.MaxLength"),
            format!("{subject} must be at most {max} characters"),
        );
        return false;
    }
    true
}

/// Required, then bounded length. One message per call at most: the
/// in-field short-circuit stops at the first failed check.
pub fn length_between(
    ctx: &ExecutionContext,
    subject: &str,
    value: &str,
    min: usize,
    max: usize,
) -> bool {
    required(ctx, subject, value)
        && min_length(ctx, subject, value, min)
        && max_length(ctx, subject, value, max)
}

/// Identifier field that must not be the nil uuid.
pub fn not_nil(ctx: &ExecutionContext, subject: &str, id: Uuid) -> bool {
    if id.is_nil() {
        ctx.add_error(
            format!("{subject}.IsRequired"),
            format!("{subject} must be provided"),
        );
        return false;
    }
    true
}

/// Inclusive numeric range.
pub fn range(ctx: &ExecutionContext, subject: &str, value: i64, min: i64, max: i64) -> bool {
    if value < min || value > max {
        ctx.add_error(
            format!("{subject}.OutOfRange"),
            format!("{subject} must be between {min} and {max}"),
        );
        return false;
    }
    true
}

/// Instant strictly after `now`.
pub fn in_future(
    ctx: &ExecutionContext,
    subject: &str,
    value: OffsetDateTime,
    now: OffsetDateTime,
) -> bool {
    if value <= now {
        ctx.add_error(
            format!("{subject}.NotInFuture"),
            format!("{subject} must lie in the future"),
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TenantInfo;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            TenantInfo::new(Uuid::new_v4(), "acme"),
            "alice",
            "unit-test",
            "Check.Test",
        )
    }

    #[test]
    fn all_runs_every_branch_before_folding() {
        let ctx = ctx();
        // Both validators run even though the first already failed.
        let ok = all([
            required(&ctx, "Thing.First", ""),
            required(&ctx, "Thing.Second", ""),
        ]);
        assert!(!ok);
        assert!(ctx.has_message("Thing.First.IsRequired"));
        assert!(ctx.has_message("Thing.Second.IsRequired"));
    }

    #[test]
    fn length_between_stops_at_first_failure() {
        let ctx = ctx();
        assert!(!length_between(&ctx, "Thing.Name", "", 2, 8));
        let messages = ctx.messages();
        // Only the required failure is reported; the length checks for
        // the same field never ran.
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].code, "Thing.Name.IsRequired");
    }

    #[test]
    fn length_bounds_report_their_own_kinds() {
        let ctx = ctx();
        assert!(!length_between(&ctx, "Thing.Name", "a", 2, 8));
        assert!(ctx.has_message("Thing.Name.MinLength"));

        let ctx = self::ctx();
        assert!(!length_between(&ctx, "Thing.Name", "abcdefghij", 2, 8));
        assert!(ctx.has_message("Thing.Name.MaxLength"));
    }

    #[test]
    fn not_nil_rejects_the_nil_uuid() {
        let ctx = ctx();
        assert!(!not_nil(&ctx, "Thing.OwnerId", Uuid::nil()));
        assert!(ctx.has_message("Thing.OwnerId.IsRequired"));
        assert!(not_nil(&ctx, "Thing.OwnerId", Uuid::new_v4()));
    }

    #[test]
    fn range_is_inclusive() {
        let ctx = ctx();
        assert!(range(&ctx, "Thing.Count", 1, 1, 10));
        assert!(range(&ctx, "Thing.Count", 10, 1, 10));
        assert!(!range(&ctx, "Thing.Count", 11, 1, 10));
        assert!(ctx.has_message("Thing.Count.OutOfRange"));
    }

    #[test]
    fn in_future_rejects_now_and_the_past() {
        use time::macros::datetime;

        let now = datetime!(2025-06-01 12:00 UTC);
        let ctx = ctx();
        assert!(!in_future(&ctx, "Thing.ExpiresAt", now, now));
        assert!(ctx.has_message("Thing.ExpiresAt.NotInFuture"));
        assert!(in_future(
            &ctx,
            "Thing.ExpiresAt",
            datetime!(2025-06-01 12:01 UTC),
            now
        ));
    }
}
