//! DuckDB-backed award store
//!
//! Stores the interesting columns for querying plus the raw record JSON,
//! keyed by contract number. Upserts run as `INSERT ... ON CONFLICT DO
//! UPDATE`, so replaying a page is a no-op apart from refreshed rows.

use super::{RecordSink, UpsertStats};
use crate::error::{Error, Result};
use crate::types::{record_key, Record};
use async_trait::async_trait;
use duckdb::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS awards (
    contract TEXT PRIMARY KEY,
    firm TEXT,
    award_title TEXT,
    agency TEXT,
    branch TEXT,
    phase TEXT,
    program TEXT,
    award_amount DOUBLE,
    proposal_award_date TEXT,
    award_year INTEGER,
    raw_data TEXT,
    updated_at TIMESTAMP DEFAULT current_timestamp
);
";

const UPSERT_SQL: &str = "
INSERT INTO awards (
    contract, firm, award_title, agency, branch, phase, program,
    award_amount, proposal_award_date, award_year, raw_data, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, current_timestamp)
ON CONFLICT (contract) DO UPDATE SET
    firm = excluded.firm,
    award_title = excluded.award_title,
    agency = excluded.agency,
    branch = excluded.branch,
    phase = excluded.phase,
    program = excluded.program,
    award_amount = excluded.award_amount,
    proposal_award_date = excluded.proposal_award_date,
    award_year = excluded.award_year,
    raw_data = excluded.raw_data,
    updated_at = now();
";

/// Award store backed by a DuckDB database file
pub struct DuckdbSink {
    // DuckDB connections are not Sync; the sink is the sole writer anyway
    conn: Mutex<Connection>,
}

impl DuckdbSink {
    /// Open (or create) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::storage(format!("Failed to open database: {e}")))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| Error::storage(format!("Failed to create tables: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Latest award date in the store, if any rows carry one
    pub fn latest_award_date(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        conn.query_row(
            "SELECT max(proposal_award_date) FROM awards
             WHERE proposal_award_date IS NOT NULL",
            [],
            |row| row.get::<_, Option<String>>(0),
        )
        .map_err(|e| Error::storage(format!("Failed to query latest date: {e}")))
    }

    /// Export the queryable columns to CSV, newest awards first
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<u64> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let target = path.as_ref().to_string_lossy().replace('\'', "''");
        let copy_sql = format!(
            "COPY (
                SELECT contract, firm, award_title, agency, branch, phase, program,
                       award_amount, proposal_award_date, award_year
                FROM awards
                ORDER BY proposal_award_date DESC
            ) TO '{target}' (HEADER, DELIMITER ',')"
        );
        conn.execute_batch(&copy_sql)
            .map_err(|e| Error::storage(format!("CSV export failed: {e}")))?;

        let count: i64 = conn
            .query_row("SELECT count(*) FROM awards", [], |row| row.get(0))
            .map_err(|e| Error::storage(format!("Failed to count rows: {e}")))?;
        Ok(count as u64)
    }

    fn count_rows(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT count(*) FROM awards", [], |row| row.get(0))
            .map_err(|e| Error::storage(format!("Failed to count rows: {e}")))
    }
}

#[async_trait]
impl RecordSink for DuckdbSink {
    async fn upsert(&self, batch: &[Record]) -> Result<UpsertStats> {
        if batch.is_empty() {
            return Ok(UpsertStats::default());
        }

        let conn = self.conn.lock().expect("connection lock poisoned");
        let before = Self::count_rows(&conn)?;

        let mut written = 0u64;
        {
            let mut stmt = conn
                .prepare(UPSERT_SQL)
                .map_err(|e| Error::storage_write(format!("Failed to prepare upsert: {e}")))?;

            for record in batch {
                let Some(contract) = record_key(record) else {
                    continue;
                };

                let raw = serde_json::to_string(record)?;
                stmt.execute(params![
                    contract,
                    text_field(record, "firm"),
                    text_field(record, "award_title"),
                    text_field(record, "agency"),
                    text_field(record, "branch"),
                    text_field(record, "phase"),
                    text_field(record, "program"),
                    amount_field(record),
                    text_field(record, "proposal_award_date"),
                    int_field(record, "award_year"),
                    raw,
                ])
                .map_err(|e| {
                    Error::storage_write(format!("Upsert failed for {contract}: {e}"))
                })?;
                written += 1;
            }
        }

        let after = Self::count_rows(&conn)?;
        let inserted = (after - before).max(0) as u64;

        Ok(UpsertStats {
            inserted,
            updated: written.saturating_sub(inserted),
        })
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        Ok(Self::count_rows(&conn)? as u64)
    }
}

impl std::fmt::Debug for DuckdbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckdbSink").finish_non_exhaustive()
    }
}

fn text_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Award amounts arrive as numbers or as formatted strings ("1,000,000.00")
fn amount_field(record: &Record) -> Option<f64> {
    match record.get("award_amount")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}

fn int_field(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
