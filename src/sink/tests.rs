//! Tests for record sinks

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn award(contract: &str, firm: &str) -> Record {
    json!({
        "contract": contract,
        "firm": firm,
        "award_title": "Widget studies",
        "agency": "NSF",
        "phase": "Phase I",
        "program": "SBIR",
        "award_amount": "100,000.00",
        "proposal_award_date": "2024-06-01",
        "award_year": 2024,
    })
}

#[tokio::test]
async fn test_memory_sink_upsert_is_idempotent() {
    let sink = MemorySink::new();

    let batch = vec![award("C-1", "Acme"), award("C-2", "Beta")];
    let stats = sink.upsert(&batch).await.unwrap();
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.updated, 0);

    // Replaying the same batch updates rather than duplicates
    let stats = sink.upsert(&batch).await.unwrap();
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.updated, 2);
    assert_eq!(sink.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_memory_sink_failure_injection() {
    let sink = MemorySink::new();
    sink.fail_writes(true);

    let err = sink.upsert(&[award("C-1", "Acme")]).await.unwrap_err();
    assert!(matches!(err, crate::error::Error::StorageWrite { .. }));

    sink.fail_writes(false);
    assert!(sink.upsert(&[award("C-1", "Acme")]).await.is_ok());
}

#[tokio::test]
async fn test_duckdb_sink_upsert_and_count() {
    let sink = DuckdbSink::in_memory().unwrap();

    let stats = sink
        .upsert(&[award("C-1", "Acme"), award("C-2", "Beta")])
        .await
        .unwrap();
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.updated, 0);
    assert_eq!(sink.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_duckdb_sink_overlapping_batches_do_not_duplicate() {
    let sink = DuckdbSink::in_memory().unwrap();

    sink.upsert(&[award("C-1", "Acme"), award("C-2", "Beta")])
        .await
        .unwrap();

    // Overlap: one existing contract with changed data, one new
    let stats = sink
        .upsert(&[award("C-2", "Beta Renamed"), award("C-3", "Gamma")])
        .await
        .unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(sink.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_duckdb_sink_skips_keyless_records() {
    let sink = DuckdbSink::in_memory().unwrap();

    let batch = vec![award("C-1", "Acme"), json!({"firm": "NoContract"})];
    let stats = sink.upsert(&batch).await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(sink.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duckdb_sink_latest_award_date() {
    let sink = DuckdbSink::in_memory().unwrap();
    assert_eq!(sink.latest_award_date().unwrap(), None);

    let mut older = award("C-1", "Acme");
    older["proposal_award_date"] = json!("2023-01-15");
    sink.upsert(&[older, award("C-2", "Beta")]).await.unwrap();

    assert_eq!(
        sink.latest_award_date().unwrap(),
        Some("2024-06-01".to_string())
    );
}

#[tokio::test]
async fn test_duckdb_sink_csv_export() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = DuckdbSink::in_memory().unwrap();

    sink.upsert(&[award("C-1", "Acme"), award("C-2", "Beta")])
        .await
        .unwrap();

    let out = dir.path().join("awards.csv");
    let exported = sink.export_csv(&out).unwrap();
    assert_eq!(exported, 2);

    let contents = std::fs::read_to_string(&out).unwrap();
    assert!(contents.starts_with("contract,"));
    assert!(contents.contains("C-1"));
    assert!(contents.contains("C-2"));
}

#[tokio::test]
async fn test_duckdb_sink_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("awards.db");

    {
        let sink = DuckdbSink::open(&path).unwrap();
        sink.upsert(&[award("C-1", "Acme")]).await.unwrap();
    }

    let sink = DuckdbSink::open(&path).unwrap();
    assert_eq!(sink.count().await.unwrap(), 1);
}
