//! Record fetchers
//!
//! A `Fetcher` pulls every record of one resource inside a date window. The
//! variant is chosen once per run by name through `FetcherKind`.

mod fetcher;
mod types;

pub use fetcher::{PaginatedFetcher, TIME_ENTRIES_PATH};
pub use types::{FetchOutput, FetchParams, FetchStats};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Fetches all records of one resource
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Registry name of this fetcher, also the schema name of its records
    fn name(&self) -> &'static str;

    /// Fetch every page for the given parameters
    async fn fetch(&self, params: &FetchParams) -> Result<FetchOutput>;
}

/// Registered fetcher variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    /// `/api/v2/time_entries`
    TimeEntries,
}

impl FetcherKind {
    /// Registry name
    pub fn name(self) -> &'static str {
        match self {
            Self::TimeEntries => "TimeEntries",
        }
    }

    /// Build the fetcher on a Freshdesk client
    pub fn build(self, client: Arc<HttpClient>) -> Box<dyn Fetcher> {
        match self {
            Self::TimeEntries => Box::new(PaginatedFetcher::time_entries(client)),
        }
    }
}

impl FromStr for FetcherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "TimeEntries" => Ok(Self::TimeEntries),
            other => Err(Error::UnknownCapability {
                capability: "fetcher",
                name: other.to_string(),
            }),
        }
    }
}
