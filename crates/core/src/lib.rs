//! Validated-entity core for the Janus identity service.
//!
//! Domain entities in Janus never mutate in place: construction and
//! every state transition go through validated registration paths that
//! either produce a fully valid entity or produce nothing and leave
//! coded diagnostics on the [`ExecutionContext`]. Every entity carries
//! tenant, audit, and concurrency metadata in its [`EntityInfo`].
//!
//! Persistence lives in `janus-storage` and `janus-repository`; this
//! crate is purely in-memory and synchronous.

pub mod cancel;
pub mod check;
pub mod clock;
pub mod consent;
pub mod context;
pub mod entity;
pub mod token;

pub use cancel::CancelToken;
pub use clock::{Clock, FixedClock, SystemClock};
pub use consent::{NewUserConsent, UserConsent};
pub use context::{ContextMessage, ExecutionContext, MessageLevel, TenantInfo};
pub use entity::{Entity, EntityInfo};
pub use token::{NewOneTimeToken, OneTimeToken, TokenState};
