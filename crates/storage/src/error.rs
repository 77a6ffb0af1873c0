use uuid::Uuid;

/// All errors a [`RecordStore`](crate::RecordStore) implementation can
/// return.
///
/// `Conflict`, `NotFound`, and `AlreadyExists` describe business
/// outcomes the repository adapter converts into `false` results with
/// context diagnostics; `Cancelled` and `Backend` propagate to the
/// caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency conflict: the row's current version does
    /// not match the expected version supplied with the write.
    #[error("version conflict on record {id}: expected version {expected_version}")]
    Conflict { id: Uuid, expected_version: i64 },

    /// No row with this id.
    #[error("record not found: {id}")]
    NotFound { id: Uuid },

    /// Insert of an id that is already present.
    #[error("record already exists: {id}")]
    AlreadyExists { id: Uuid },

    /// The caller's cancellation token was triggered before or during
    /// the call.
    #[error("operation cancelled")]
    Cancelled,

    /// Backend-specific failure (I/O, serialization, connection).
    #[error("storage backend error: {0}")]
    Backend(String),
}
