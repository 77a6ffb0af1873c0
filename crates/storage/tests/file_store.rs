//! Durability checks for the JSON-file backend: a second open of the
//! same path sees what the first one wrote.

use std::sync::Arc;

use time::macros::datetime;
use uuid::Uuid;

use janus_core::{CancelToken, ExecutionContext, FixedClock, TenantInfo};
use janus_storage::conformance::ConformanceRow;
use janus_storage::{JsonFileStore, RecordStore, StorageError};

fn ctx() -> ExecutionContext {
    ExecutionContext::new(
        TenantInfo::new(Uuid::new_v4(), "acme"),
        "alice",
        "file-store-test",
        "Storage.FileStore",
    )
    .with_clock(Arc::new(FixedClock(datetime!(2025-01-01 00:00 UTC))))
}

fn row(payload: &str) -> ConformanceRow {
    ConformanceRow {
        id: Uuid::new_v4(),
        payload: payload.to_string(),
        created_at: datetime!(2025-01-01 00:00 UTC),
        changed_at: None,
        version: 0,
    }
}

#[tokio::test]
async fn rows_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tokens.json");
    let ctx = ctx();
    let cancel = CancelToken::new();

    let seeded = row("durable");
    let id = seeded.id;
    {
        let store = JsonFileStore::open(&path).expect("open");
        store.insert(&ctx, seeded, &cancel).await.expect("insert");
    }

    let reopened = JsonFileStore::<ConformanceRow>::open(&path).expect("reopen");
    let fetched = reopened
        .get_by_id(&ctx, id, &cancel)
        .await
        .expect("get")
        .expect("row present after reopen");
    assert_eq!(fetched.payload, "durable");
    assert_eq!(fetched.version, 1);
}

#[tokio::test]
async fn version_discipline_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tokens.json");
    let ctx = ctx();
    let cancel = CancelToken::new();

    let seeded = row("v1");
    let id = seeded.id;
    {
        let store = JsonFileStore::open(&path).expect("open");
        store.insert(&ctx, seeded, &cancel).await.expect("insert");
    }

    let reopened = JsonFileStore::<ConformanceRow>::open(&path).expect("reopen");
    let mut current = reopened
        .get_by_id(&ctx, id, &cancel)
        .await
        .expect("get")
        .expect("row present");
    current.payload = "v2".to_string();

    // A stale expected version must still be rejected after reopen.
    let stale = reopened.update(&ctx, current.clone(), 7, &cancel).await;
    assert!(matches!(stale, Err(StorageError::Conflict { .. })));

    let new_version = reopened
        .update(&ctx, current, 1, &cancel)
        .await
        .expect("update with the stored version");
    assert_eq!(new_version, 2);
}

#[tokio::test]
async fn missing_file_is_an_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("never-written.json");

    let store = JsonFileStore::<ConformanceRow>::open(&path).expect("open");
    let ctx = ctx();
    let cancel = CancelToken::new();
    assert!(store
        .get_by_id(&ctx, Uuid::new_v4(), &cancel)
        .await
        .expect("get")
        .is_none());
    // No mutation yet, so nothing was created on disk.
    assert!(!path.exists());
}
