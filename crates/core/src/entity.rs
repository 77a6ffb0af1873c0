//! Entity identity, tenancy, and audit metadata.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::context::{ExecutionContext, TenantInfo};

/// Identity, tenant, audit trail, and concurrency version carried by
/// every Janus entity.
///
/// The creation fields are written once at registration. The
/// `last_changed_*` fields are `None` until the first successful
/// mutation and are overwritten on each one after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: Uuid,
    pub tenant: TenantInfo,

    pub created_by: String,
    pub created_at: OffsetDateTime,
    pub created_correlation_id: Uuid,
    pub created_execution_origin: String,
    pub created_business_operation: String,

    pub last_changed_by: Option<String>,
    pub last_changed_at: Option<OffsetDateTime>,
    pub last_changed_correlation_id: Option<Uuid>,
    pub last_changed_execution_origin: Option<String>,
    pub last_changed_business_operation: Option<String>,

    /// Concurrency token as last observed in memory. Informational
    /// only: the repository re-reads the stored version immediately
    /// before every write and never trusts this field for the check.
    pub version: i64,
}

impl EntityInfo {
    /// Fresh metadata for a newly registered entity, stamped from the
    /// context's tenant, actor, and clock.
    pub fn register_new(ctx: &ExecutionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant: ctx.tenant().clone(),
            created_by: ctx.execution_user().to_owned(),
            created_at: ctx.now(),
            created_correlation_id: ctx.correlation_id(),
            created_execution_origin: ctx.execution_origin().to_owned(),
            created_business_operation: ctx.business_operation().to_owned(),
            last_changed_by: None,
            last_changed_at: None,
            last_changed_correlation_id: None,
            last_changed_execution_origin: None,
            last_changed_business_operation: None,
            version: 1,
        }
    }

    /// Overwrite the last-changed audit fields from the context and
    /// advance the informational version. Called exactly once per
    /// successful mutation, by the registration path that produced the
    /// mutated clone.
    pub fn stamp_changed(&mut self, ctx: &ExecutionContext) {
        self.last_changed_by = Some(ctx.execution_user().to_owned());
        self.last_changed_at = Some(ctx.now());
        self.last_changed_correlation_id = Some(ctx.correlation_id());
        self.last_changed_execution_origin = Some(ctx.execution_origin().to_owned());
        self.last_changed_business_operation = Some(ctx.business_operation().to_owned());
        self.version += 1;
    }

    /// Instant of the most recent change, falling back to creation.
    /// This is the timestamp the modified-since change feed filters on.
    pub fn modified_at(&self) -> OffsetDateTime {
        self.last_changed_at.unwrap_or(self.created_at)
    }
}

/// Implemented by every domain entity so generic code (the repository
/// adapter in particular) can reach its identity and audit metadata.
pub trait Entity: Clone + Send + Sync {
    fn info(&self) -> &EntityInfo;
}
