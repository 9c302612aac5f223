//! Pipeline types
//!
//! The trigger request as sent by the scheduler, and the report returned
//! after a run.

use crate::fetch::{FetchParams, FetcherKind};
use crate::loader::{LoadOptions, LoadOutcome, LoaderKind};
use crate::store::TableRef;
use serde::{Deserialize, Serialize};

/// One pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Source side
    pub freshdesk: FetchRequest,
    /// Destination side
    pub bigquery: LoadRequest,
}

/// Which fetcher to run, and with what
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Fetcher registry name, also the schema registry key
    pub function_name: String,
    #[serde(default)]
    pub function_parameters: FetchParameters,
}

/// Fetch parameters as they appear in the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParameters {
    /// Lower date token, `yesterday` when absent
    #[serde(default)]
    pub executed_after: Option<String>,
    /// Upper date token, `yesterday` when absent
    #[serde(default)]
    pub executed_before: Option<String>,
    /// First page, 1 when absent
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size, configured default when absent
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// Which loader to run, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Loader registry name
    pub function_name: String,
    pub function_parameters: LoadParameters,
}

/// Destination parameters as they appear in the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadParameters {
    pub project_name: String,
    pub dataset_name: String,
    /// Derived from the month when absent
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub write_disposition: Option<String>,
    #[serde(default)]
    pub create_disposition: Option<String>,
    /// Refresh a whole month: drop and rebuild the table
    #[serde(default)]
    pub update_last_month: bool,
}

/// Fully resolved run, before any remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub fetcher: FetcherKind,
    pub loader: LoaderKind,
    pub params: FetchParams,
    pub table: TableRef,
    pub options: LoadOptions,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Fetcher that ran
    pub fetcher: &'static str,
    /// Loader that ran
    pub loader: &'static str,
    /// Records fetched
    pub records: usize,
    /// Pages requested
    pub pages: u32,
    /// Destination table
    pub table: TableRef,
    /// What the loader did
    pub outcome: LoadOutcome,
}
