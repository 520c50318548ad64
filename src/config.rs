//! Sync configuration
//!
//! Defaults target the public SBIR/STTR award API. A JSON config file can
//! override any field; every field has a serde default so partial files work.

use crate::error::{Error, Result};
use crate::types::{SkipPolicy, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Complete configuration for a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the award API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Query parameter carrying the page offset
    #[serde(default = "default_offset_param")]
    pub offset_param: String,

    /// Query parameter carrying the page size
    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    /// Records per page, capped by the server at [`MAX_PAGE_SIZE`]
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Mandatory minimum delay between any two requests, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Maximum retry attempts for a transiently failing page
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay between retries, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// How far back the incremental sync looks for new awards, in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Upper bound on records scanned during an incremental sync
    #[serde(default = "default_incremental_scan_cap")]
    pub incremental_scan_cap: u64,

    /// What to do with a page that failed permanently
    #[serde(default)]
    pub skip_policy: SkipPolicy,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Directory holding the database, progress file, and exports
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_base_url() -> String {
    "https://api.www.sbir.gov/public/api/awards".to_string()
}

fn default_offset_param() -> String {
    "start".to_string()
}

fn default_limit_param() -> String {
    "rows".to_string()
}

fn default_page_size() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    5000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_lookback_days() -> i64 {
    30
}

fn default_incremental_scan_cap() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("sbir-sync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for SyncConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults are valid")
    }
}

impl SyncConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {e}")))?;
        Ok(config)
    }

    /// Validate field bounds and the API URL
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_config(
                "page_size",
                format!("must be in 1..={MAX_PAGE_SIZE}"),
            ));
        }

        if self.request_delay_ms < 500 {
            return Err(Error::invalid_config(
                "request_delay_ms",
                "must be at least 500ms for API politeness",
            ));
        }

        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "https" {
            return Err(Error::invalid_config("base_url", "must use HTTPS"));
        }

        if self.lookback_days <= 0 {
            return Err(Error::invalid_config("lookback_days", "must be positive"));
        }

        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum inter-request delay
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Initial retry backoff
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Retry backoff cap
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Path of the persisted progress file
    pub fn progress_path(&self) -> PathBuf {
        self.data_dir.join("sync_progress.json")
    }

    /// Path of the DuckDB award store
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("sbir_awards.db")
    }

    /// Default path for CSV exports
    pub fn csv_export_path(&self) -> PathBuf {
        self.data_dir.join("sbir_awards.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.offset_param, "start");
        assert_eq!(config.limit_param, "rows");
        assert_eq!(config.lookback_days, 30);
        assert!(config.base_url.starts_with("https://"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_overrides() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"page_size": 100, "max_retries": 5}"#).unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_retries, 5);
        // Untouched fields keep their defaults
        assert_eq!(config.request_delay_ms, 1000);
    }

    #[test]
    fn test_validate_page_size() {
        let mut config = SyncConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        config.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());

        config.page_size = MAX_PAGE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_delay_and_scheme() {
        let mut config = SyncConfig::default();
        config.request_delay_ms = 100;
        assert!(config.validate().is_err());

        config.request_delay_ms = 500;
        config.base_url = "http://api.example.com/awards".to_string();
        assert!(config.validate().is_err());

        config.base_url = "https://api.example.com/awards".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_under_data_dir() {
        let config = SyncConfig::default();
        assert_eq!(
            config.progress_path(),
            PathBuf::from("data/sync_progress.json")
        );
        assert_eq!(config.database_path(), PathBuf::from("data/sbir_awards.db"));
    }
}
