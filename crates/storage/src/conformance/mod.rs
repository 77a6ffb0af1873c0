//! Conformance test suite for [`RecordStore`] implementations.
//!
//! Backend-agnostic checks any implementation must pass before a
//! repository is pointed at it:
//!
//! - **Insert**: round-tripping, version normalization, duplicate
//!   rejection, cancellation
//! - **Version**: conditional writes, conflict detection, conflict
//!   leaving the row untouched, delete under the version contract
//! - **Enumerate**: page windows, ordinal sequence, early stop,
//!   modified-since filtering and ordering
//!
//! Backends call [`run_conformance_suite`] with a factory producing a
//! fresh, empty store per test:
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
//! assert_eq!(report.failed, 0, "{report}");
//! ```

mod enumerate;
mod insert;
mod version;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::macros::datetime;
use time::OffsetDateTime;
use uuid::Uuid;

use janus_core::{ExecutionContext, FixedClock, TenantInfo};

use crate::row::StoredRow;
use crate::traits::RecordStore;

/// Row type the suite drives stores with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformanceRow {
    pub id: Uuid,
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub changed_at: Option<OffsetDateTime>,
    pub version: i64,
}

impl StoredRow for ConformanceRow {
    fn row_id(&self) -> Uuid {
        self.id
    }

    fn row_version(&self) -> i64 {
        self.version
    }

    fn set_row_version(&mut self, version: i64) {
        self.version = version;
    }

    fn modified_at(&self) -> OffsetDateTime {
        self.changed_at.unwrap_or(self.created_at)
    }
}

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category ("insert", "version", "enumerate").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Failure explanation when `passed` is false.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full suite. `factory` is invoked once per test and must
/// return a fresh, empty store so tests stay isolated.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore<ConformanceRow>,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(enumerate::run_enumerate_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();
    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(super) const SUITE_NOW: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

pub(super) fn suite_ctx() -> ExecutionContext {
    ExecutionContext::new(
        TenantInfo::new(Uuid::new_v4(), "conformance"),
        "suite",
        "conformance",
        "Storage.Conformance",
    )
    .with_clock(Arc::new(FixedClock(SUITE_NOW)))
}

pub(super) fn make_row(payload: &str, created_at: OffsetDateTime) -> ConformanceRow {
    ConformanceRow {
        id: Uuid::new_v4(),
        payload: payload.to_string(),
        created_at,
        changed_at: None,
        version: 0,
    }
}

pub(super) fn expect(cond: bool, msg: &str) -> Result<(), String> {
    if cond {
        Ok(())
    } else {
        Err(msg.to_string())
    }
}
