//! Storage collaborator contract for Janus repositories.
//!
//! A [`RecordStore`] implementation provides persistence for one row
//! type and enforces the optimistic-concurrency version check on every
//! write. The repository adapter above this crate supplies the expected
//! version it just read; the store is the component that must compare
//! it atomically against the current row.
//!
//! Two reference backends are included, [`MemoryStore`] (test double
//! and semantic reference) and [`JsonFileStore`] (a JSON document on
//! disk with atomic saves), plus a backend-agnostic [`conformance`]
//! suite any implementation can run against itself.

pub mod conformance;
mod error;
mod file;
mod memory;
mod pagination;
mod row;
mod traits;

pub use error::StorageError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use pagination::Pagination;
pub use row::StoredRow;
pub use traits::{check_cancelled, RecordStore, RowHandler, SelectRows};
