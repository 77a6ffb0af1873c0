use std::future::Future;

use janus_core::CancelToken;

use super::{expect, make_row, suite_ctx, ConformanceRow, TestResult, SUITE_NOW};
use crate::error::StorageError;
use crate::traits::RecordStore;

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore<ConformanceRow>,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.push(TestResult::from_result(
        "insert",
        "insert_then_get_round_trips",
        insert_then_get_round_trips(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "insert_normalizes_version_to_one",
        insert_normalizes_version_to_one(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "duplicate_insert_rejected",
        duplicate_insert_rejected(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "exists_reflects_presence",
        exists_reflects_presence(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "get_missing_returns_none",
        get_missing_returns_none(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "cancelled_token_rejects_call",
        cancelled_token_rejects_call(factory().await).await,
    ));
    results
}

async fn insert_then_get_round_trips<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("alpha", SUITE_NOW);
    let id = row.id;

    store
        .insert(&ctx, row.clone(), &cancel)
        .await
        .map_err(|e| e.to_string())?;
    let fetched = store
        .get_by_id(&ctx, id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("inserted row not found")?;

    expect(fetched.id == id, "id changed on round trip")?;
    expect(fetched.payload == "alpha", "payload changed on round trip")?;
    expect(fetched.created_at == SUITE_NOW, "created_at changed")?;
    expect(fetched.version == 1, "stored version is not 1")
}

async fn insert_normalizes_version_to_one<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let mut row = make_row("alpha", SUITE_NOW);
    row.version = 42;
    let id = row.id;

    store
        .insert(&ctx, row, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    let fetched = store
        .get_by_id(&ctx, id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("inserted row not found")?;
    expect(
        fetched.version == 1,
        "insert did not normalize the carried version",
    )
}

async fn duplicate_insert_rejected<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("original", SUITE_NOW);
    let id = row.id;
    store
        .insert(&ctx, row.clone(), &cancel)
        .await
        .map_err(|e| e.to_string())?;

    let mut dup = row;
    dup.payload = "impostor".to_string();
    match store.insert(&ctx, dup, &cancel).await {
        Err(StorageError::AlreadyExists { id: reported }) => {
            expect(reported == id, "AlreadyExists reported the wrong id")?;
        }
        other => return Err(format!("expected AlreadyExists, got {other:?}")),
    }

    let fetched = store
        .get_by_id(&ctx, id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("original row vanished")?;
    expect(
        fetched.payload == "original",
        "duplicate insert overwrote the original",
    )
}

async fn exists_reflects_presence<S: RecordStore<ConformanceRow>>(store: S) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("alpha", SUITE_NOW);
    let id = row.id;

    expect(
        !store
            .exists(&ctx, id, &cancel)
            .await
            .map_err(|e| e.to_string())?,
        "exists before insert",
    )?;
    store
        .insert(&ctx, row, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(
        store
            .exists(&ctx, id, &cancel)
            .await
            .map_err(|e| e.to_string())?,
        "missing after insert",
    )
}

async fn get_missing_returns_none<S: RecordStore<ConformanceRow>>(store: S) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let found = store
        .get_by_id(&ctx, uuid::Uuid::new_v4(), &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(found.is_none(), "get of a random id returned a row")
}

async fn cancelled_token_rejects_call<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    cancel.cancel();
    match store.get_by_id(&ctx, uuid::Uuid::new_v4(), &cancel).await {
        Err(StorageError::Cancelled) => Ok(()),
        other => Err(format!("expected Cancelled, got {other:?}")),
    }
}
