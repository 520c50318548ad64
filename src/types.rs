//! Common types shared across the crate

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A single award record as returned by the upstream API.
///
/// Records are opaque JSON objects; the engine only ever inspects the
/// natural key and a couple of quality fields before handing the record
/// to the sink.
pub type Record = Value;

/// Maximum page size enforced by the upstream API.
///
/// Requests above this limit fail permanently, so it is treated as a
/// configuration bound rather than something to retry around.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Field holding the natural unique key of a record
pub const KEY_FIELD: &str = "contract";

/// Field holding the award date used for incremental windows
pub const DATE_FIELD: &str = "proposal_award_date";

/// What the driver does with a page that failed permanently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Log the failure, record the gap, advance one page width, continue
    #[default]
    Skip,
    /// Stop the run on the first permanently failed page
    Abort,
}

/// Extract the natural key from a record, if present and non-empty
pub fn record_key(record: &Record) -> Option<&str> {
    record
        .get(KEY_FIELD)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Extract the award date string from a record, if present
pub fn record_date(record: &Record) -> Option<&str> {
    record
        .get(DATE_FIELD)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Drop records that cannot be stored idempotently.
///
/// A record needs its natural key plus a non-empty firm and title to be
/// worth keeping; anything else is logged and discarded.
pub fn validate_batch(records: Vec<Record>) -> Vec<Record> {
    let mut valid = Vec::with_capacity(records.len());

    for record in records {
        let Some(key) = record_key(&record) else {
            warn!("Dropping record without a contract number");
            continue;
        };

        let has_firm = record
            .get("firm")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        let has_title = record
            .get("award_title")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());

        if !has_firm || !has_title {
            warn!(contract = %key, "Dropping record with empty firm or title");
            continue;
        }

        valid.push(record);
    }

    valid
}
