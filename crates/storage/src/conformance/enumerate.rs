use std::future::Future;

use time::Duration;

use janus_core::CancelToken;

use super::{expect, make_row, suite_ctx, ConformanceRow, TestResult, SUITE_NOW};
use crate::pagination::Pagination;
use crate::traits::RecordStore;

pub(super) async fn run_enumerate_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore<ConformanceRow>,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.push(TestResult::from_result(
        "enumerate",
        "enumerate_all_visits_rows_with_ordinals",
        enumerate_all_visits_rows_with_ordinals(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "enumerate",
        "enumerate_all_respects_page_window",
        enumerate_all_respects_page_window(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "enumerate",
        "enumerate_all_stops_when_handler_declines",
        enumerate_all_stops_when_handler_declines(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "enumerate",
        "modified_since_filters_by_timestamp",
        modified_since_filters_by_timestamp(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "enumerate",
        "modified_since_is_inclusive",
        modified_since_is_inclusive(factory().await).await,
    ));
    results.push(TestResult::from_result(
        "enumerate",
        "modified_since_orders_by_modified_at",
        modified_since_orders_by_modified_at(factory().await).await,
    ));
    results
}

/// Insert `n` rows created at `SUITE_NOW + i` minutes, payloads "row-0"...
async fn seed_rows<S: RecordStore<ConformanceRow>>(
    store: &S,
    n: usize,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    for i in 0..n {
        let row = make_row(
            &format!("row-{i}"),
            SUITE_NOW + Duration::minutes(i as i64),
        );
        store
            .insert(&ctx, row, &cancel)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn enumerate_all_visits_rows_with_ordinals<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    seed_rows(&store, 5).await?;

    let mut seen = Vec::new();
    let mut handler = |row: &ConformanceRow, ordinal: u64| {
        seen.push((ordinal, row.payload.clone()));
        true
    };
    let ok = store
        .enumerate_all(&ctx, Pagination::default(), &mut handler, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    expect(ok, "scan reported failure")?;
    expect(seen.len() == 5, "did not visit every row")?;
    let ordinals: Vec<u64> = seen.iter().map(|(o, _)| *o).collect();
    expect(ordinals == vec![0, 1, 2, 3, 4], "ordinals not sequential")
}

async fn enumerate_all_respects_page_window<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    seed_rows(&store, 5).await?;

    let mut first_page = 0usize;
    let mut handler = |_: &ConformanceRow, _: u64| {
        first_page += 1;
        true
    };
    store
        .enumerate_all(
            &ctx,
            Pagination::new(1, 2).unwrap(),
            &mut handler,
            &cancel,
        )
        .await
        .map_err(|e| e.to_string())?;
    expect(first_page == 2, "first page did not hold 2 rows")?;

    let mut last_page = 0usize;
    let mut handler = |_: &ConformanceRow, _: u64| {
        last_page += 1;
        true
    };
    store
        .enumerate_all(
            &ctx,
            Pagination::new(3, 2).unwrap(),
            &mut handler,
            &cancel,
        )
        .await
        .map_err(|e| e.to_string())?;
    expect(last_page == 1, "last page did not hold the remainder")
}

async fn enumerate_all_stops_when_handler_declines<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    seed_rows(&store, 5).await?;

    let mut visits = 0usize;
    let mut handler = |_: &ConformanceRow, ordinal: u64| {
        visits += 1;
        ordinal < 1
    };
    let ok = store
        .enumerate_all(&ctx, Pagination::default(), &mut handler, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    expect(ok, "early stop flipped the success flag")?;
    expect(visits == 2, "handler invoked after it declined")
}

async fn modified_since_filters_by_timestamp<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    seed_rows(&store, 5).await?;

    let since = SUITE_NOW + Duration::minutes(3);
    let mut payloads = Vec::new();
    let mut handler = |row: &ConformanceRow, _: u64| {
        payloads.push(row.payload.clone());
        true
    };
    let ok = store
        .enumerate_modified_since(&ctx, since, &mut handler, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    expect(ok, "scan reported failure")?;
    expect(
        payloads == vec!["row-3".to_string(), "row-4".to_string()],
        "wrong rows for the cursor",
    )
}

async fn modified_since_is_inclusive<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    let row = make_row("exact", SUITE_NOW);
    store
        .insert(&ctx, row, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    let mut visits = 0usize;
    let mut handler = |_: &ConformanceRow, _: u64| {
        visits += 1;
        true
    };
    store
        .enumerate_modified_since(&ctx, SUITE_NOW, &mut handler, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(visits == 1, "row at exactly `since` was excluded")
}

async fn modified_since_orders_by_modified_at<S: RecordStore<ConformanceRow>>(
    store: S,
) -> Result<(), String> {
    let ctx = suite_ctx();
    let cancel = CancelToken::new();
    // Insert out of chronological order; changed_at beats created_at.
    let mut early = make_row("early", SUITE_NOW + Duration::minutes(10));
    early.changed_at = Some(SUITE_NOW + Duration::minutes(1));
    let late = make_row("late", SUITE_NOW + Duration::minutes(5));
    store
        .insert(&ctx, late, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    store
        .insert(&ctx, early, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    let mut payloads = Vec::new();
    let mut handler = |row: &ConformanceRow, _: u64| {
        payloads.push(row.payload.clone());
        true
    };
    store
        .enumerate_modified_since(&ctx, SUITE_NOW, &mut handler, &cancel)
        .await
        .map_err(|e| e.to_string())?;
    expect(
        payloads == vec!["early".to_string(), "late".to_string()],
        "feed not ordered by modified-at",
    )
}
