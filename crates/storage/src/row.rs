use time::OffsetDateTime;
use uuid::Uuid;

/// Storage-side view of a persisted row.
///
/// Every Janus row carries the same identity/version/modified columns
/// alongside its entity-specific fields; this trait exposes them so the
/// generic backends can enforce the version check and the
/// modified-since filter without knowing concrete row types.
pub trait StoredRow: Clone + Send + Sync {
    fn row_id(&self) -> Uuid;

    fn row_version(&self) -> i64;

    /// Backends own version assignment: they normalize the version on
    /// insert and advance it on update through this setter.
    fn set_row_version(&mut self, version: i64);

    /// Last-changed timestamp, falling back to created-at. The
    /// modified-since enumeration filters on this instant.
    fn modified_at(&self) -> OffsetDateTime;
}
