use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{EntityInfo, TenantInfo};

/// The identity/tenancy/audit/version columns every Janus row shares,
/// mirroring [`EntityInfo`] field for field. Row types embed this with
/// `#[serde(flatten)]` so the persisted document stays flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoColumns {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub tenant_name: String,

    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_correlation_id: Uuid,
    pub created_execution_origin: String,
    pub created_business_operation: String,

    pub last_changed_by: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_changed_at: Option<OffsetDateTime>,
    pub last_changed_correlation_id: Option<Uuid>,
    pub last_changed_execution_origin: Option<String>,
    pub last_changed_business_operation: Option<String>,

    pub version: i64,
}

impl InfoColumns {
    pub fn from_info(info: &EntityInfo) -> Self {
        Self {
            id: info.id,
            tenant_id: info.tenant.tenant_id,
            tenant_name: info.tenant.name.clone(),
            created_by: info.created_by.clone(),
            created_at: info.created_at,
            created_correlation_id: info.created_correlation_id,
            created_execution_origin: info.created_execution_origin.clone(),
            created_business_operation: info.created_business_operation.clone(),
            last_changed_by: info.last_changed_by.clone(),
            last_changed_at: info.last_changed_at,
            last_changed_correlation_id: info.last_changed_correlation_id,
            last_changed_execution_origin: info.last_changed_execution_origin.clone(),
            last_changed_business_operation: info.last_changed_business_operation.clone(),
            version: info.version,
        }
    }

    pub fn to_info(&self) -> EntityInfo {
        EntityInfo {
            id: self.id,
            tenant: TenantInfo::new(self.tenant_id, self.tenant_name.clone()),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            created_correlation_id: self.created_correlation_id,
            created_execution_origin: self.created_execution_origin.clone(),
            created_business_operation: self.created_business_operation.clone(),
            last_changed_by: self.last_changed_by.clone(),
            last_changed_at: self.last_changed_at,
            last_changed_correlation_id: self.last_changed_correlation_id,
            last_changed_execution_origin: self.last_changed_execution_origin.clone(),
            last_changed_business_operation: self.last_changed_business_operation.clone(),
            version: self.version,
        }
    }

    /// The change-feed timestamp: last change, falling back to creation.
    pub fn modified_at(&self) -> OffsetDateTime {
        self.last_changed_at.unwrap_or(self.created_at)
    }
}
