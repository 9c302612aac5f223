//! Paginated fetcher implementation

use super::types::{FetchOutput, FetchParams, FetchStats};
use super::Fetcher;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::PageCursor;
use crate::types::JsonValue;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Path of the time entries listing
pub const TIME_ENTRIES_PATH: &str = "/api/v2/time_entries";

/// Walks every page of one list endpoint inside a date window
pub struct PaginatedFetcher {
    client: Arc<HttpClient>,
    name: &'static str,
    path: String,
}

impl PaginatedFetcher {
    /// Create a fetcher for an arbitrary list path
    pub fn new(client: Arc<HttpClient>, name: &'static str, path: impl Into<String>) -> Self {
        Self {
            client,
            name,
            path: path.into(),
        }
    }

    /// Fetcher for `/api/v2/time_entries`
    pub fn time_entries(client: Arc<HttpClient>) -> Self {
        Self::new(client, "TimeEntries", TIME_ENTRIES_PATH)
    }

    /// Request one page and decode it into records
    async fn fetch_page(&self, page: u32, config: RequestConfig) -> Result<Vec<JsonValue>> {
        let response = self
            .client
            .get(&self.path, config)
            .await
            .map_err(|e| page_error(page, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::decode(format!("Failed to read response body: {e}")))?;

        if status != StatusCode::OK {
            return Err(Error::RemoteRequest {
                page,
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<JsonValue>(&body)? {
            JsonValue::Array(records) => Ok(records),
            other => Err(Error::decode(format!(
                "Expected a JSON array on page {page}, got {}",
                json_kind(&other)
            ))),
        }
    }
}

#[async_trait]
impl Fetcher for PaginatedFetcher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, params: &FetchParams) -> Result<FetchOutput> {
        let start = Instant::now();
        let mut cursor = PageCursor::new(params.start_page, params.page_size);
        let mut records = Vec::new();

        info!(
            "Fetching {} from page {} ({} to {})",
            self.name,
            cursor.page(),
            params.window.after,
            params.window.before
        );

        loop {
            let page = cursor.page();
            let config = params
                .window
                .query_params()
                .into_iter()
                .chain(cursor.query())
                .fold(RequestConfig::new(), |config, (key, value)| {
                    config.query(key, value)
                });

            let page_records = self.fetch_page(page, config).await?;
            let count = page_records.len();
            records.extend(page_records);

            debug!("Page {page}: fetched {count} records");

            if cursor.advance(count).is_none() {
                break;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let stats = FetchStats {
            pages_fetched: cursor.pages_seen(),
            records: records.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Fetched {} {} records in {} pages",
            stats.records, self.name, stats.pages_fetched
        );

        Ok(FetchOutput { records, stats })
    }
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Tie a failed request to the page it was for
fn page_error(page: u32, error: Error) -> Error {
    match error {
        Error::HttpStatus { status, body } => Error::RemoteRequest { page, status, body },
        Error::RateLimited { body, .. } => Error::RemoteRequest {
            page,
            status: 429,
            body,
        },
        e @ (Error::Timeout { .. } | Error::Http(_)) => Error::RemoteTransport {
            page,
            message: e.to_string(),
        },
        other => other,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
