use std::future::Future;

use janus_core::CancelToken;

use super::{expect, make_row, suite_ctx, ConformanceRow, TestResult, SUITE_NOW};
use crate::error::StorageError;
use crate::traits::RecordStore;

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore<ConformanceRow>,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.push(TestResult::from_result(
        "version",
        "update_with_correct_version_succeeds",
        update_with_correct_version_succeeds(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_increments_sequentially",
        update_increments_sequentially(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_wrong_version_conflicts",
        update_with_wrong_version_conflicts(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_does_not_mutate_row",
        conflict_does_not_mutate_row(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_reports_id_and_expected_version",
        conflict_reports_id_and_expected_version(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_missing_row_not_found",
        update_missing_row_not_found(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "delete_with_correct_version_removes",
        delete_with_correct_version_removes(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "delete_with_wrong_version_conflicts_and_keeps_row",
        delete_with_wrong_version_conflicts_and_keeps_row(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "delete_missing_row_not_found",
        delete_missing_row_not_found(factory().await).await,
    ));
    results
}

async fn seed<S: RecordStore<ConformanceRow>>(store: &S) -> Result<ConformanceRow, String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("seed", SUITE_NOW);
    let id = row.id;
    store
        .insert(&ctx, row, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    store
        .get_by_id(&ctx, id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "seed row not found after insert".to_string())
}

async fn update_with_correct_version_succeeds<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let mut row = seed(&store).await?;
    row.payload = "updated".to_string();

    let new_version = store
        .update(&ctx, row.clone(), 1, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(new_version == 2, "new version is not expected + 1")?;

    let fetched = store
        .get_by_id(&ctx, row.id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("row vanished after update")?;
    expect(fetched.payload == "updated", "update did not apply")?;
    expect(fetched.version == 2, "stored version not advanced")
}

async fn update_increments_sequentially<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = seed(&store).await?;

    for expected in 1..=3 {
        let current = store
            .get_by_id(&ctx, row.id, &cancel)
            .await
            .map_err(|e| e.to_string())?
            .ok_or("row vanished")?;
        expect(current.version == expected, "unexpected version sequence")?;
        let new_version = store
            .update(&ctx, current.clone(), expected, &cancel)
            .await
            .map_err(|e| e.to_string())?;
        expect(new_version == expected + 1, "returned version out of step")?;
    }
    Ok(())
}

async fn update_with_wrong_version_conflicts<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = seed(&store).await?;

    for stale in [0, 2, 7] {
        match store.update(&ctx, row.clone(), stale, &cancel).await {
            Err(StorageError::Conflict { .. }) => {}
            other => return Err(format!("expected Conflict for version {stale}, got {other:?}")),
        }
    }
    Ok(())
}

async fn conflict_does_not_mutate_row<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let mut row = seed(&store).await?;
    row.payload = "should not land".to_string();

    let _ = store.update(&ctx, row.clone(), 99, &cancel).await;

    let fetched = store
        .get_by_id(&ctx, row.id, &cancel)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("row vanished")?;
    expect(fetched.payload == "seed", "conflicting update changed the row")?;
    expect(fetched.version == 1, "conflicting update advanced the version")
}

async fn conflict_reports_id_and_expected_version<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = seed(&store).await?;

    match store.update(&ctx, row.clone(), 5, &cancel).await {
        Err(StorageError::Conflict {
            id,
            expected_version,
        }) => {
            expect(id == row.id, "conflict reported the wrong id")?;
            expect(
                expected_version == 5,
                "conflict reported the wrong expected version",
            )
        }
        other => Err(format!("expected Conflict, got {other:?}")),
    }
}

async fn update_missing_row_not_found<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("ghost", SUITE_NOW);
    match store.update(&ctx, row, 1, &cancel).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {other:?}")),
    }
}

async fn delete_with_correct_version_removes<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = seed(&store).await?;

    store
        .delete(&ctx, row.id, 1, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    let found = store
        .get_by_id(&ctx, row.id, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(found.is_none(), "row still present after delete")
}

async fn delete_with_wrong_version_conflicts_and_keeps_row<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = seed(&store).await?;

    match store.delete(&ctx, row.id, 3, &cancel).await {
        Err(StorageError::Conflict { .. }) => {}
        other => return Err(format!("expected Conflict, got {other:?}")),
    }
    let found = store
        .get_by_id(&ctx, row.id, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(found.is_some(), "conflicting delete removed the row")
}

async fn delete_missing_row_not_found<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    match store.delete(&ctx, uuid::Uuid::new_v4(), 1, &cancel).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {other:?}")),
    }
}
