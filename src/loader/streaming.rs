//! Streaming-insert loader

use super::types::{LoadOptions, LoadOutcome, LoaderConfig};
use super::Loader;
use crate::error::{Error, Result};
use crate::schema::{time_entries_schema, TableSchema};
use crate::store::{InsertBatch, TableRef, TableSpec, TableStore, TimePartitioning};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Creates the table on first use and streams rows into it
pub struct StreamingLoader {
    store: Arc<dyn TableStore>,
    schema: TableSchema,
    config: LoaderConfig,
}

impl StreamingLoader {
    /// Loader for time entries
    pub fn new(store: Arc<dyn TableStore>, config: LoaderConfig) -> Self {
        Self {
            store,
            schema: time_entries_schema(),
            config,
        }
    }

    /// Use another schema for created tables
    #[must_use]
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Insert into a table that was just created
    ///
    /// New tables take a while before they accept streaming inserts, so
    /// failures are retried under the configured policy. Every attempt
    /// resends the same batch.
    async fn insert_with_retry(&self, table: &TableRef, batch: &InsertBatch<'_>) -> Result<u32> {
        let policy = &self.config.retry;
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.store.insert_rows(table, batch).await {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    if !policy.allows_retry(attempt, start.elapsed()) {
                        return Err(Error::InsertRetriesExhausted {
                            table: table.to_string(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    let delay = policy.delay_after(attempt);
                    warn!(
                        "Insert into {} failed (attempt {}/{}), retrying in {:?}: {}",
                        table, attempt, policy.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl Loader for StreamingLoader {
    fn name(&self) -> &'static str {
        "InsertRows"
    }

    async fn load(
        &self,
        records: &[JsonValue],
        table: &TableRef,
        options: &LoadOptions,
    ) -> Result<LoadOutcome> {
        if records.is_empty() {
            info!("No records to insert into {}", table);
            return Ok(LoadOutcome::Skipped);
        }

        if options.replace_existing {
            let existed = self.store.delete_table(table).await?;
            debug!("Dropped {} (existed: {})", table, existed);
            if !self.config.replace_pause.is_zero() {
                tokio::time::sleep(self.config.replace_pause).await;
            }
        }

        let batch = InsertBatch::new(records);
        debug!("Insert batch {} for {}", batch.batch_id(), table);

        if self.store.get_table(table).await?.is_some() {
            self.store.insert_rows(table, &batch).await?;
            info!("Appended {} rows to {}", records.len(), table);
            return Ok(LoadOutcome::Appended {
                rows: records.len(),
            });
        }

        self.store
            .create_table(&TableSpec {
                table: table.clone(),
                schema: self.schema.clone(),
                time_partitioning: Some(TimePartitioning::day()),
            })
            .await?;

        let attempts = self.insert_with_retry(table, &batch).await?;
        info!(
            "Created {} and inserted {} rows after {} attempts",
            table,
            records.len(),
            attempts
        );

        Ok(LoadOutcome::CreatedAndInserted {
            rows: records.len(),
            attempts,
        })
    }
}
