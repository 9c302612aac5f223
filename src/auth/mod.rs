//! Authentication module
//!
//! Supports: Basic (Freshdesk API key), Bearer, Google service account,
//! Google metadata server
//!
//! The `Authenticator` handles all auth types and caches tokens for the
//! auth types that have to fetch one.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{
    AuthConfig, CachedToken, ServiceAccountKey, BIGQUERY_SCOPE, FRESHDESK_API_KEY_PASSWORD,
    METADATA_TOKEN_URL,
};

#[cfg(test)]
mod tests;
