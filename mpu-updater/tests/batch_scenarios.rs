//! End-to-end batch runs against a spy marketplace API

mod helpers;

use helpers::{fast_settings, write_input, write_lookup, SpyApi};
use mpu_updater::models::{ProgressSnapshot, UpdateKind, UpdateOutcome};
use mpu_updater::services::{
    ApiResponse, BatchCoordinator, ProgressObserver, ReportGenerator, UpdatePayload,
};
use mpu_common::events::RunStatus;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_variant_price_update_single_call() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("123", "456", "s1,s2")]);
    let input = write_input(dir.path(), &[("123", "10", "0")]);
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(4, None, 1))
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(api.calls(), 1);
    let request = &api.requests()[0];
    assert_eq!(request.product_id, "456");
    match &request.payload {
        UpdatePayload::SkuPrice(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].sku_id, "s1");
            assert_eq!(items[1].sku_id, "s2");
            assert!(items.iter().all(|item| item.price == "10"));
        }
        other => panic!("expected per-variant price payload, got {:?}", other),
    }

    let outcome = &run.outcomes[0];
    assert!(outcome.success);
    assert_eq!(outcome.operation_label(), "sku_price");
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(run.statistics.sku_updates, 1);
    assert_eq!(run.statistics.successful, 1);
    assert_eq!(run.statistics.total_retries, 0);
}

#[tokio::test]
async fn test_whole_item_price_sends_single_tier() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("789", "1011", "")]);
    let input = write_input(dir.path(), &[("789", "15.50", "0")]);
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(4, None, 1))
        .run(&lookup, &input)
        .await
        .unwrap();

    let value: Value =
        serde_json::from_str(&api.requests()[0].payload.param_value().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({"price_type": "TIERED", "tiered_price": [{"quantity": "1", "price": "15.50"}]})
    );
    assert_eq!(run.outcomes[0].operation_label(), "direct_price");
    assert_eq!(run.statistics.direct_updates, 1);
}

#[tokio::test]
async fn test_unknown_spu_fails_without_calling_api() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[]);
    let input = write_input(dir.path(), &[("999", "1", "5")]);
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Inventory, api.clone(), fast_settings(2, None, 3))
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(api.calls(), 0);
    let outcome = &run.outcomes[0];
    assert!(!outcome.success);
    assert_eq!(outcome.code, "SPU_NOT_FOUND");
    assert_eq!(outcome.product_id, "NOT_FOUND");
    assert_eq!(outcome.value, "5");
    assert_eq!(run.statistics.lookup_failures, 1);
    assert_eq!(run.statistics.failed, 1);
}

#[tokio::test]
async fn test_server_errors_then_success() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("123", "456", "")]);
    let input = write_input(dir.path(), &[("123", "1", "7")]);
    let api = Arc::new(SpyApi::scripted(vec![
        Ok(ApiResponse::error("503", "Service Unavailable")),
        Ok(ApiResponse::error("503", "Service Unavailable")),
        Ok(ApiResponse::success(Some("req-final".to_string()))),
    ]));

    let run = BatchCoordinator::new(UpdateKind::Inventory, api.clone(), fast_settings(1, None, 3))
        .run(&lookup, &input)
        .await
        .unwrap();

    let outcome = &run.outcomes[0];
    assert!(outcome.success);
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(outcome.request_id.as_deref(), Some("req-final"));
    assert_eq!(api.calls(), 3);
    assert_eq!(run.statistics.total_retries, 2);
}

#[tokio::test]
async fn test_zero_rows_is_valid_run() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "2", "")]);
    let input = write_input(dir.path(), &[]);
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(2, Some(5), 1))
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(api.calls(), 0);
    assert_eq!(run.statistics.total_processed, 0);
    assert_eq!(run.statistics.success_rate_display(), "0%");

    let report = ReportGenerator::new(dir.path().join("reports"))
        .generate(&run)
        .unwrap();
    assert!(report.summary.contains("Success rate:        0%"));
    let mut reader = csv::Reader::from_path(&report.detail_path).unwrap();
    assert_eq!(reader.records().count(), 0);
}

#[tokio::test]
async fn test_mixed_run_statistics_and_report() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(
        dir.path(),
        &[("1", "10", "a,b"), ("2", "20", ""), ("3", "30", "c")],
    );
    let input = write_input(
        dir.path(),
        &[
            ("1", "5", "1"),
            ("2", "6", "2"),
            ("3", "7", "3"),
            ("4", "8", "4"),
            ("2", "oops", "5"),
        ],
    );
    let api = Arc::new(SpyApi::scripted(vec![]));

    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(3, Some(2), 1))
        .run(&lookup, &input)
        .await
        .unwrap();

    let stats = &run.statistics;
    assert_eq!(stats.total_processed, 5);
    assert_eq!(stats.successful + stats.failed, stats.total_processed);
    assert_eq!(stats.sku_updates, 2);
    assert_eq!(stats.direct_updates, 1);
    assert_eq!(stats.lookup_failures, 1);
    assert_eq!(stats.validation_failures, 1);
    assert_eq!(api.calls(), 3);

    let report = ReportGenerator::new(dir.path().join("out"))
        .generate(&run)
        .unwrap();
    let mut reader = csv::Reader::from_path(&report.detail_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), run.outcomes.len());

    let stats_json: Value =
        serde_json::from_str(&std::fs::read_to_string(&report.stats_path).unwrap()).unwrap();
    assert_eq!(stats_json["total_processed"], 5);
    assert_eq!(stats_json["sku_updates"], 2);
    assert!(report.summary.contains("Success rate:        60.0%"));
}

#[tokio::test]
async fn test_chunked_run_matches_unchunked() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "10", "a"), ("2", "20", "")]);
    let rows: Vec<(String, String, String)> = (0..25)
        .map(|i| {
            let spu = ["1", "2", "9"][i % 3].to_string();
            (spu, format!("{}", i), format!("{}", i))
        })
        .collect();
    let borrowed: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
        .collect();
    let input = write_input(dir.path(), &borrowed);

    let whole = BatchCoordinator::new(
        UpdateKind::Inventory,
        Arc::new(SpyApi::new()),
        fast_settings(4, None, 3),
    )
    .run(&lookup, &input)
    .await
    .unwrap();
    let chunked = BatchCoordinator::new(
        UpdateKind::Inventory,
        Arc::new(SpyApi::new()),
        fast_settings(2, Some(4), 3),
    )
    .run(&lookup, &input)
    .await
    .unwrap();

    assert_eq!(whole.statistics.total_processed, 25);
    assert_eq!(whole.statistics, chunked.statistics);
}

#[tokio::test]
async fn test_rate_limits_raise_delay_monotonically() {
    #[derive(Default)]
    struct DelayObserver {
        delays: Mutex<Vec<f64>>,
    }

    impl ProgressObserver for DelayObserver {
        fn on_row_completed(&self, snapshot: &ProgressSnapshot, _outcome: &UpdateOutcome) {
            self.delays.lock().unwrap().push(snapshot.current_delay_ms);
        }
    }

    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "10", "")]);
    let input = write_input(
        dir.path(),
        &[("1", "1", "0"), ("1", "2", "0"), ("1", "3", "0"), ("1", "4", "0")],
    );
    // Every row is rate limited twice before succeeding
    let mut script = Vec::new();
    for _ in 0..4 {
        script.push(Ok(ApiResponse::error("429", "")));
        script.push(Ok(ApiResponse::error("ApiCallLimit", "Frequency exceeds the limit")));
        script.push(Ok(ApiResponse::success(None)));
    }
    let api = Arc::new(SpyApi::scripted(script));
    let observer = Arc::new(DelayObserver::default());

    // One worker keeps the script order deterministic
    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(1, None, 0))
        .with_observer(observer.clone())
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(run.statistics.successful, 4);
    assert_eq!(run.statistics.rate_limited_attempts, 8);
    assert_eq!(run.statistics.total_retries, 8);

    let delays = observer.delays.lock().unwrap().clone();
    assert_eq!(delays.len(), 4);
    assert!(delays[0] > 0.0);
    assert!(delays.windows(2).all(|w| w[1] >= w[0]));
    assert!(delays.iter().all(|d| *d <= 100.0 + 1e-9));
}

#[tokio::test]
async fn test_observer_sees_every_row_and_status() {
    #[derive(Default)]
    struct CountingObserver {
        rows: AtomicUsize,
        statuses: Mutex<Vec<RunStatus>>,
    }

    impl ProgressObserver for CountingObserver {
        fn on_status_changed(&self, status: RunStatus, _detail: Option<&str>) {
            self.statuses.lock().unwrap().push(status);
        }

        fn on_row_completed(&self, snapshot: &ProgressSnapshot, _outcome: &UpdateOutcome) {
            self.rows.fetch_add(1, Ordering::SeqCst);
            assert_eq!(snapshot.total, 6);
            assert!(snapshot.processed <= snapshot.total);
        }
    }

    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "10", "x,y")]);
    let input = write_input(
        dir.path(),
        &[
            ("1", "1", "1"),
            ("1", "2", "2"),
            ("1", "3", "3"),
            ("1", "4", "4"),
            ("1", "5", "5"),
            ("1", "6", "6"),
        ],
    );
    let observer = Arc::new(CountingObserver::default());
    let api = Arc::new(SpyApi::new().with_latency(Duration::from_millis(2)));

    BatchCoordinator::new(UpdateKind::Price, api, fast_settings(3, Some(4), 1))
        .with_observer(observer.clone())
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(observer.rows.load(Ordering::SeqCst), 6);
    assert_eq!(
        *observer.statuses.lock().unwrap(),
        vec![
            RunStatus::Starting,
            RunStatus::LoadingLookup,
            RunStatus::Processing,
            RunStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_missing_input_column_aborts_before_calls() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "10", "")]);
    let input = helpers::write_file(dir.path(), "bad.csv", "SPU_ID,price\n1,2\n");
    let api = Arc::new(SpyApi::new());

    let result = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(2, None, 1))
        .run(&lookup, &input)
        .await;

    assert!(matches!(result, Err(mpu_common::Error::InvalidInput(_))));
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn test_empty_lookup_file_fails_every_row_lookup() {
    let dir = TempDir::new().unwrap();
    let lookup = helpers::write_file(dir.path(), "lookup.csv", "");
    let input = write_input(dir.path(), &[("999", "1", "5")]);
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Inventory, api.clone(), fast_settings(2, None, 3))
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(api.calls(), 0);
    assert_eq!(run.outcomes.len(), 1);
    assert_eq!(run.outcomes[0].code, "SPU_NOT_FOUND");
    assert_eq!(run.statistics.lookup_failures, 1);
}

#[tokio::test]
async fn test_empty_input_file_is_zero_row_run() {
    let dir = TempDir::new().unwrap();
    let lookup = write_lookup(dir.path(), &[("1", "10", "")]);
    let input = helpers::write_file(dir.path(), "input.csv", "");
    let api = Arc::new(SpyApi::new());

    let run = BatchCoordinator::new(UpdateKind::Price, api.clone(), fast_settings(2, Some(5), 1))
        .run(&lookup, &input)
        .await
        .unwrap();

    assert_eq!(api.calls(), 0);
    assert_eq!(run.total_rows, 0);
    assert!(run.outcomes.is_empty());
    assert_eq!(run.statistics.success_rate_display(), "0%");
}
