//! Shared types
//!
//! Records move through the pipeline as untyped JSON; the enums here are
//! the small knobs that several modules read from settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One Freshdesk record or BigQuery row
pub type JsonValue = serde_json::Value;

/// How retry delays grow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    Constant,
    Linear,
    #[default]
    Exponential,
}

impl BackoffType {
    /// Delay before retry `attempt` (0-based), never above `max`
    pub fn delay(self, attempt: u32, initial: Duration, max: Duration) -> Duration {
        let factor = match self {
            BackoffType::Constant => 1,
            BackoffType::Linear => attempt.saturating_add(1),
            BackoffType::Exponential => 2u32.saturating_pow(attempt),
        };
        initial.saturating_mul(factor).min(max)
    }
}

/// Signing algorithm for service account assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// What Google issues service account keys for
    #[default]
    RS256,
    RS384,
    RS512,
}

impl From<JwtAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::RS256 => Self::RS256,
            JwtAlgorithm::RS384 => Self::RS384,
            JwtAlgorithm::RS512 => Self::RS512,
        }
    }
}

/// Blank settings values count as unset
pub trait OptionStringExt {
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}
