//! Tests for the pagination driver
//!
//! Each test simulates the upstream API with wiremock, mounting one mock
//! per offset so the expected request counts double as assertions on the
//! driver's fetch pattern.

use super::*;
use crate::progress::{ProgressState, ProgressStore};
use crate::sink::{MemorySink, RecordSink};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str, page_size: u32) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.base_url = format!("{base_url}/api/awards");
    config.page_size = page_size;
    config.request_delay_ms = 1;
    config.initial_backoff_ms = 1;
    config.max_backoff_ms = 10;
    config
}

fn awards_page(start: u64, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "contract": format!("C-{}", start + i as u64),
                "firm": "Acme Research",
                "award_title": "Widget studies",
                "proposal_award_date": "2024-06-01",
            })
        })
        .collect()
}

async fn mount_page(server: &MockServer, offset: u64, body: Vec<Value>, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

fn driver_in(
    dir: &TempDir,
    config: SyncConfig,
) -> (SyncDriver<MemorySink>, ProgressStore) {
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let driver = SyncDriver::new(config, store.clone(), MemorySink::new()).unwrap();
    (driver, store)
}

#[tokio::test]
async fn test_exhaustion_with_250_records() {
    let server = MockServer::start().await;
    // 250 records, page size 100: three data pages, then the empty page
    // at offset 300 fetched twice (confirmation re-fetch)
    mount_page(&server, 0, awards_page(0, 100), 1).await;
    mount_page(&server, 100, awards_page(100, 100), 1).await;
    mount_page(&server, 200, awards_page(200, 50), 1).await;
    mount_page(&server, 300, vec![], 2).await;

    let dir = TempDir::new().unwrap();
    let (driver, store) = driver_in(&dir, test_config(&server.uri(), 100));

    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.total_fetched, 250);
    assert_eq!(report.pages_fetched, 5);
    assert_eq!(report.inserted, 250);
    assert!(report.skipped.is_empty());
    assert_eq!(driver.sink().count().await.unwrap(), 250);

    let state = store.load().await.unwrap().unwrap();
    assert!(state.completed);
    assert_eq!(state.total_fetched, 250);
    // The offset cursor stays a multiple of the page size
    assert_eq!(state.next_offset % 100, 0);
}

#[tokio::test]
async fn test_single_empty_page_does_not_end_the_walk() {
    let server = MockServer::start().await;
    mount_page(&server, 0, awards_page(0, 100), 1).await;

    // Offset 100 answers empty once, then produces records: the
    // confirmation re-fetch must pick them up and the walk continues.
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Value>::new()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 100, awards_page(100, 50), 1).await;
    mount_page(&server, 200, vec![], 2).await;

    let dir = TempDir::new().unwrap();
    let (driver, store) = driver_in(&dir, test_config(&server.uri(), 100));

    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.total_fetched, 150);
    assert!(report.skipped.is_empty());
    assert_eq!(driver.sink().count().await.unwrap(), 150);

    let state = store.load().await.unwrap().unwrap();
    assert!(state.completed);
    assert_eq!(state.total_fetched, 150);
}

#[tokio::test]
async fn test_resume_skips_committed_pages() {
    let server = MockServer::start().await;
    // A resumed run must never re-fetch offset 0
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(awards_page(0, 100)))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, 100, awards_page(100, 50), 1).await;
    mount_page(&server, 200, vec![], 2).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut prior = ProgressState::new(100);
    prior.advance(100);
    store.save(&prior).await.unwrap();

    let driver =
        SyncDriver::new(test_config(&server.uri(), 100), store.clone(), MemorySink::new())
            .unwrap();
    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.total_fetched, 150);
    // Only the tail was written this run
    assert_eq!(report.records_written(), 50);

    let state = store.load().await.unwrap().unwrap();
    assert!(state.completed);
    assert_eq!(state.next_offset, 200);
}

#[tokio::test]
async fn test_transient_failures_recover_without_skips() {
    let server = MockServer::start().await;
    mount_page(&server, 0, awards_page(0, 100), 1).await;

    // Offset 100: three 503s, then success. With max_retries = 3 this is
    // exactly four requests for that offset and no skip is recorded.
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, 100, awards_page(100, 50), 1).await;
    mount_page(&server, 200, vec![], 2).await;

    let dir = TempDir::new().unwrap();
    let (driver, _) = driver_in(&dir, test_config(&server.uri(), 100));

    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.total_fetched, 150);
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn test_permanent_failure_skips_one_page_and_continues() {
    let server = MockServer::start().await;
    mount_page(&server, 0, awards_page(0, 100), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 200, awards_page(200, 100), 1).await;
    mount_page(&server, 300, vec![], 2).await;

    let dir = TempDir::new().unwrap();
    let (driver, store) = driver_in(&dir, test_config(&server.uri(), 100));

    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::PartialWithSkips);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].offset, 100);
    assert_eq!(report.skipped[0].length, 100);
    // The failed page does not count as fetched
    assert_eq!(report.pages_fetched, 4);
    assert_eq!(driver.sink().count().await.unwrap(), 200);

    // The gap survives in the persisted state for manual inspection
    let state = store.load().await.unwrap().unwrap();
    assert!(state.completed);
    assert_eq!(state.skipped.len(), 1);
}

#[tokio::test]
async fn test_abort_policy_stops_on_failed_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), 100);
    config.skip_policy = SkipPolicy::Abort;
    let (driver, store) = driver_in(&dir, config);

    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Aborted);
    assert_eq!(report.total_fetched, 0);
    // Nothing committed, nothing persisted
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_storage_failure_does_not_advance_progress() {
    let server = MockServer::start().await;
    mount_page(&server, 0, awards_page(0, 100), 1).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let sink = MemorySink::new();
    sink.fail_writes(true);

    let driver = SyncDriver::new(test_config(&server.uri(), 100), store.clone(), sink).unwrap();

    let err = driver.run().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::StorageWrite { .. }));

    // The page will be re-fetched on the next invocation
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_interrupt_stops_at_page_boundary() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let (driver, _) = driver_in(&dir, test_config(&server.uri(), 100));

    driver
        .interrupt_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let report = driver.run().await.unwrap();
    assert_eq!(report.status, SyncStatus::Aborted);
    assert_eq!(report.pages_fetched, 0);
}

#[tokio::test]
async fn test_completed_walk_switches_to_incremental() {
    let server = MockServer::start().await;

    let recent = Utc::now().format("%Y-%m-%d").to_string();
    let page0 = vec![
        json!({
            "contract": "C-NEW-1",
            "firm": "Acme Research",
            "award_title": "Fresh award",
            "proposal_award_date": recent,
        }),
        json!({
            "contract": "C-OLD-1",
            "firm": "Acme Research",
            "award_title": "Ancient award",
            "proposal_award_date": "2000-01-01",
        }),
    ];
    // Every record at offset 100 predates the window, which ends the scan
    let page1 = vec![json!({
        "contract": "C-OLD-2",
        "firm": "Acme Research",
        "award_title": "Ancient award",
        "proposal_award_date": "2000-02-01",
    })];
    mount_page(&server, 0, page0, 1).await;
    mount_page(&server, 100, page1, 1).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut prior = ProgressState::new(100);
    prior.advance(100);
    prior.mark_completed();
    store.save(&prior).await.unwrap();

    let driver =
        SyncDriver::new(test_config(&server.uri(), 100), store.clone(), MemorySink::new())
            .unwrap();
    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.pages_fetched, 2);
    // Only the record inside the window was written
    assert_eq!(report.inserted, 1);
    assert_eq!(driver.sink().count().await.unwrap(), 1);

    let state = store.load().await.unwrap().unwrap();
    assert!(state.completed);
    assert!(state.last_incremental_at.is_some());
}

#[tokio::test]
async fn test_incremental_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, 0, vec![], 1).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut prior = ProgressState::new(100);
    prior.mark_completed();
    store.save(&prior).await.unwrap();

    let driver =
        SyncDriver::new(test_config(&server.uri(), 100), store, MemorySink::new()).unwrap();
    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.inserted, 0);
}

#[tokio::test]
async fn test_incremental_skipped_page_surfaces_in_report() {
    let server = MockServer::start().await;

    // Offset 0 fails permanently; the scan steps over it, finds the
    // empty tail, and the report carries the gap.
    Mock::given(method("GET"))
        .and(path("/api/awards"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 100, vec![], 1).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut prior = ProgressState::new(100);
    prior.mark_completed();
    store.save(&prior).await.unwrap();

    let driver =
        SyncDriver::new(test_config(&server.uri(), 100), store, MemorySink::new()).unwrap();
    let report = driver.run().await.unwrap();

    assert_eq!(report.status, SyncStatus::PartialWithSkips);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].offset, 0);
    assert_eq!(report.skipped[0].length, 100);
    assert_eq!(report.inserted, 0);
}

#[tokio::test]
async fn test_incremental_respects_scan_cap() {
    let server = MockServer::start().await;

    let recent = Utc::now().format("%Y-%m-%d").to_string();
    // Full pages of in-window records would keep the scan going forever
    // without the cap
    let full_page: Vec<Value> = (0..100)
        .map(|i| {
            json!({
                "contract": format!("C-{i}"),
                "firm": "Acme Research",
                "award_title": "Fresh award",
                "proposal_award_date": recent,
            })
        })
        .collect();
    mount_page(&server, 0, full_page.clone(), 1).await;
    mount_page(&server, 100, full_page, 1).await;

    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut prior = ProgressState::new(100);
    prior.mark_completed();
    store.save(&prior).await.unwrap();

    let mut config = test_config(&server.uri(), 100);
    config.incremental_scan_cap = 200;
    let driver = SyncDriver::new(config, store, MemorySink::new()).unwrap();

    let report = driver.run().await.unwrap();
    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.pages_fetched, 2);
}
