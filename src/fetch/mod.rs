//! Page fetching
//!
//! One bounded HTTP request per call, plus outcome classification. The
//! fetcher never mutates shared state; retries and offset advancement are
//! the concern of [`RetryPolicy`] and the driver respectively.
//!
//! Classification rules:
//! - network timeout or connection failure: transient
//! - HTTP 5xx (and 429): transient
//! - HTTP 4xx: permanent, signals a request bug
//! - body that is neither a JSON array nor a `{"docs": [...]}` object:
//!   permanent, the contract itself is broken
//! - 200 with zero records: an empty page, the exhaustion signal

mod pacer;
mod retry;

pub use pacer::RequestPacer;
pub use retry::RetryPolicy;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::types::{Record, MAX_PAGE_SIZE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A request for one page of records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Starting position within the dataset
    pub offset: u64,
    /// Number of records requested
    pub page_size: u32,
}

impl PageRequest {
    /// Create a page request, rejecting page sizes outside the server bounds
    pub fn new(offset: u64, page_size: u32) -> Result<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_config(
                "page_size",
                format!("must be in 1..={MAX_PAGE_SIZE}, got {page_size}"),
            ));
        }
        Ok(Self { offset, page_size })
    }
}

/// Issues one paced, bounded request per call
pub struct PageFetcher {
    client: Client,
    pacer: RequestPacer,
    base_url: String,
    offset_param: String,
    limit_param: String,
    timeout: Duration,
}

impl PageFetcher {
    /// Build a fetcher from the sync configuration.
    ///
    /// Fails fast on an unparseable base URL; that is a configuration bug,
    /// not something the driver should page through.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Url::parse(&config.base_url)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            pacer: RequestPacer::new(config.request_delay()),
            base_url: config.base_url.clone(),
            offset_param: config.offset_param.clone(),
            limit_param: config.limit_param.clone(),
            timeout: config.timeout(),
        })
    }

    /// Fetch a single page.
    ///
    /// Waits on the pacer first, so every call (including retries) honors
    /// the minimum inter-request delay. An empty vector means the server
    /// returned a well-formed page with zero records.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Record>> {
        self.pacer.wait().await;

        debug!(
            offset = request.offset,
            page_size = request.page_size,
            "Fetching page"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                (self.offset_param.as_str(), request.offset.to_string()),
                (self.limit_param.as_str(), request.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), request.offset, body));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                Error::Http(e)
            }
        })?;

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(request.offset, format!("invalid JSON: {e}")))?;

        extract_records(json, request.offset)
    }
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Pull the record list out of either upstream response shape.
///
/// The API answers with a bare array or with an object wrapping the
/// array under `docs`; anything else is a broken contract.
fn extract_records(json: Value, offset: u64) -> Result<Vec<Record>> {
    match json {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("docs") {
            Some(Value::Array(records)) => Ok(records),
            Some(_) => Err(Error::malformed(offset, "'docs' field is not an array")),
            None => Err(Error::malformed(
                offset,
                "object response without a 'docs' array",
            )),
        },
        other => Err(Error::malformed(
            offset,
            format!("expected array or object, got {}", value_kind(&other)),
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
