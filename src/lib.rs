// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # freshdesk-bq
//!
//! Extracts Freshdesk time entries and loads them into BigQuery.
//!
//! ## Features
//!
//! - **Date tokens**: `yesterday`, `last_month`, `last_month_start`,
//!   `last_month_end` or explicit `YYYY-MM-DD` bounds
//! - **Exhaustive pagination**: walks pages until a short page
//! - **Two loaders**: streaming inserts into a partitioned table created on
//!   first use, or a newline-delimited JSON load job
//! - **Lag-tolerant inserts**: bounded retry after table creation
//! - **HTTP trigger**: `POST /` with the run request
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use freshdesk_bq::config::Settings;
//! use freshdesk_bq::engine::{Pipeline, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> freshdesk_bq::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let pipeline = Pipeline::from_settings(&settings, false)?;
//!
//!     let request: RunRequest = serde_json::from_str(include_str!("request.json"))?;
//!     let report = pipeline.run(&request).await?;
//!     println!("{} records into {}", report.records, report.table);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │          Trigger (POST /)  /  CLI (run, serve)               │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ RunRequest
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │                          Pipeline                            │
//! │   DateResolver ──► Fetcher ──► Loader ──► TableStore         │
//! └──────────────────────────────────────────────────────────────┘
//!        │              │            │             │
//!    Clock         HttpClient    RetryPolicy   BigQuery REST
//!                  Pagination    SchemaRegistry  / Memory
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication for both APIs
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Page-number pagination
pub mod pagination;

/// Date token resolution
pub mod dates;

/// Paginated Freshdesk fetchers
pub mod fetch;

/// Table schemas and the schema registry
pub mod schema;

/// Destination table stores
pub mod store;

/// Table loaders
pub mod loader;

/// Fetch-then-load pipeline
pub mod engine;

/// Runtime settings
pub mod config;

/// Command-line interface and HTTP trigger
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::Settings;
pub use engine::{Pipeline, RunReport, RunRequest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
