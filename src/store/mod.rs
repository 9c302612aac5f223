//! Destination table store
//!
//! The loaders talk to the warehouse through `TableStore`. `BigQueryStore`
//! speaks the BigQuery v2 REST API; `MemoryStore` keeps tables in process
//! for dry runs and tests.

mod bigquery;
mod memory;
mod types;

pub use bigquery::{BigQueryStore, BIGQUERY_ENDPOINT};
pub use memory::{MemoryStore, MemoryTable, StoreCall};
pub use types::{
    CreateDisposition, InsertBatch, JobHandle, JobState, JobStatus, LoadJobSpec, TableInfo,
    TableRef, TableSpec, TimePartitioning, WriteDisposition,
};

use crate::error::Result;
use crate::types::JsonValue;
use async_trait::async_trait;

/// Primitives the loaders need from the warehouse
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Table metadata, `None` when the table does not exist
    async fn get_table(&self, table: &TableRef) -> Result<Option<TableInfo>>;

    /// Create a table
    async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo>;

    /// Stream rows into an existing table
    ///
    /// Retrying with the same batch must not store a row twice.
    async fn insert_rows(&self, table: &TableRef, batch: &InsertBatch<'_>) -> Result<()>;

    /// Delete a table; returns false when it did not exist
    async fn delete_table(&self, table: &TableRef) -> Result<bool>;

    /// Submit a load job carrying `rows` as newline-delimited JSON
    async fn submit_load_job(&self, job: &LoadJobSpec, rows: &[JsonValue]) -> Result<JobHandle>;

    /// Current status of a job
    async fn get_job(&self, job: &JobHandle) -> Result<JobStatus>;
}
