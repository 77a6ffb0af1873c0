//! Repository adapters between Janus entities and their storage rows.
//!
//! One generic adapter, [`EntityRepository`], implements the
//! read-verify-write protocol for every entity type: reads materialize
//! trusted rows into entities, writes re-read the stored row and pass
//! the version of that read (never the version the caller's in-memory
//! entity carries) to the storage collaborator's conditional write.
//! Per-entity modules contribute only a row type, a [`RowMapper`], and
//! their finder methods.
//!
//! Concurrency conflicts and "not found" are business outcomes here:
//! the adapter returns `Ok(false)` and leaves a coded diagnostic on the
//! [`ExecutionContext`](janus_core::ExecutionContext). Only backend
//! failures and cancellation surface as errors.

mod adapter;
mod columns;
pub mod consent;
pub mod token;

pub use adapter::{EntityHandler, EntityRepository, RowMapper};
pub use columns::InfoColumns;
pub use consent::{ConsentMapper, ConsentRepository, ConsentRow, ConsentStore};
pub use token::{TokenMapper, TokenRepository, TokenRow, TokenStore};
