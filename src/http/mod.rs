//! Outbound HTTP
//!
//! Both APIs are reached through [`HttpClient`]: Freshdesk with Basic auth
//! and an optional request budget, BigQuery with a Google bearer token.
//! Transient failures are retried inside the client, so callers only see
//! the final outcome.

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestBody, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
