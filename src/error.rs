//! Error types for freshdesk-bq
//!
//! One enum covers the whole run. Variants are grouped by the stage that
//! produces them, so the server can hand `to_string()` back to the caller
//! unchanged.

use thiserror::Error;

/// The main error type for freshdesk-bq
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Settings
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Run requests
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid date format: '{input}' (expected yesterday, last_month, last_month_start, last_month_end or YYYY-MM-DD)")]
    InvalidDateFormat { input: String },

    #[error("Invalid {kind} disposition: '{value}'")]
    InvalidDisposition { kind: &'static str, value: String },

    #[error("Unknown {capability} '{name}'")]
    UnknownCapability { capability: &'static str, name: String },

    // ============================================================================
    // Credentials
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("JWT generation failed: {message}")]
    JwtGeneration { message: String },

    // ============================================================================
    // Transport
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64, body: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ============================================================================
    // Freshdesk
    // ============================================================================
    #[error("Error making request to Freshdesk API (page {page}): {status} - {body}")]
    RemoteRequest { page: u32, status: u16, body: String },

    #[error("Error making request to Freshdesk API (page {page}): {message}")]
    RemoteTransport { page: u32, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // BigQuery
    // ============================================================================
    #[error("Schema error for field '{field}': {message}")]
    Schema { field: String, message: String },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Destination store error: {message}")]
    Store { message: String },

    #[error("Insert into {table} failed: {message}")]
    Insert { table: String, message: String },

    #[error("Insert into {table} still failing after {attempts} attempts: {last_error}")]
    InsertRetriesExhausted {
        table: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Load job {job_id} failed: {message}")]
    LoadJob { job_id: String, message: String },

    // ============================================================================
    // Files
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDateFormat {
            input: input.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn insert(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Insert {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Status code for errors that came back from a server
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } | Error::RemoteRequest { status, .. } => {
                Some(*status)
            }
            Error::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Freshdesk page a fetch failed on
    pub fn page(&self) -> Option<u32> {
        match self {
            Error::RemoteRequest { page, .. } | Error::RemoteTransport { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// Whether another attempt of the same request may succeed
    ///
    /// Transport failures and gateway statuses qualify. Rejections of the
    /// request itself (4xx other than 429) do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout { .. } => true,
            _ => self
                .status()
                .is_some_and(|status| matches!(status, 429 | 500 | 502 | 503 | 504)),
        }
    }

    /// Whether the destination table is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound { .. }) || self.status() == Some(404)
    }
}

/// Result type alias for freshdesk-bq
pub type Result<T> = std::result::Result<T, Error>;
