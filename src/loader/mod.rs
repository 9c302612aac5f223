//! Table loaders
//!
//! A `Loader` writes one batch of records into a destination table. Two
//! variants are registered by name:
//!
//! - `InsertRows`: streaming inserts into a time-entries table, created on
//!   first use with daily ingestion-time partitions
//! - `InsertJson`: a newline-delimited JSON load job using a schema from the
//!   registry, or autodetect when none is declared

mod load_job;
mod streaming;
mod types;

pub use load_job::LoadJobLoader;
pub use streaming::StreamingLoader;
pub use types::{LoadOptions, LoadOutcome, LoadPhase, LoaderConfig, RetryPolicy};

use crate::error::{Error, Result};
use crate::schema::SchemaRegistry;
use crate::store::{TableRef, TableStore};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Writes records into a destination table
#[async_trait]
pub trait Loader: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Load `records` into `table`; an empty batch is a no-op
    async fn load(
        &self,
        records: &[JsonValue],
        table: &TableRef,
        options: &LoadOptions,
    ) -> Result<LoadOutcome>;
}

/// Registered loader variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Streaming inserts (`InsertRows`)
    InsertRows,
    /// Load job (`InsertJson`)
    InsertJson,
}

impl LoaderKind {
    /// Registry name
    pub fn name(self) -> &'static str {
        match self {
            Self::InsertRows => "InsertRows",
            Self::InsertJson => "InsertJson",
        }
    }

    /// Build the loader
    pub fn build(
        self,
        store: Arc<dyn TableStore>,
        registry: Arc<SchemaRegistry>,
        config: LoaderConfig,
    ) -> Box<dyn Loader> {
        match self {
            Self::InsertRows => Box::new(StreamingLoader::new(store, config)),
            Self::InsertJson => Box::new(LoadJobLoader::new(store, registry, config)),
        }
    }
}

impl FromStr for LoaderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "InsertRows" => Ok(Self::InsertRows),
            "InsertJson" => Ok(Self::InsertJson),
            other => Err(Error::UnknownCapability {
                capability: "loader",
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests;
