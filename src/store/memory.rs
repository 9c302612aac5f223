//! In-process `TableStore`
//!
//! Used by `--dry-run` and the test suites. Every call is recorded so the
//! order of store operations can be asserted.

use super::types::{
    CreateDisposition, InsertBatch, JobHandle, JobState, JobStatus, LoadJobSpec, TableInfo,
    TableRef, TableSpec, TimePartitioning, WriteDisposition,
};
use super::TableStore;
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::types::JsonValue;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::debug;

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `get_table`
    GetTable(String),
    /// `create_table`
    CreateTable(String),
    /// `insert_rows` with the number of rows
    InsertRows {
        /// Table
        table: String,
        /// Rows in the request
        rows: usize,
    },
    /// `delete_table`
    DeleteTable(String),
    /// `submit_load_job` with the number of rows
    SubmitLoadJob {
        /// Destination table
        table: String,
        /// Rows in the upload
        rows: usize,
    },
    /// `get_job`
    GetJob(String),
}

/// A table held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    /// Column definitions
    pub schema: Option<TableSchema>,
    /// Partitioning
    pub time_partitioning: Option<TimePartitioning>,
    /// Stored rows in insertion order
    pub rows: Vec<JsonValue>,
}

#[derive(Debug)]
struct MemoryJob {
    polls_left: u32,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<TableRef, MemoryTable>,
    calls: Vec<StoreCall>,
    /// Remaining inserts to reject per freshly created table
    lagging: BTreeMap<TableRef, u32>,
    /// Insert ids already stored, per table
    insert_ids: BTreeMap<TableRef, BTreeSet<String>>,
    /// Batch id of every insert call, in order
    insert_batches: Vec<String>,
    /// Inserts that store their rows but report a timeout
    lost_acks: u32,
    jobs: BTreeMap<String, MemoryJob>,
    next_job: u64,
}

/// In-memory table store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    insert_lag: u32,
    job_polls: u32,
    fail_jobs: Option<String>,
}

impl MemoryStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the first `n` inserts into every table created by this store
    ///
    /// Emulates the delay before a new table accepts streaming inserts.
    #[must_use]
    pub fn with_insert_lag(mut self, n: u32) -> Self {
        self.insert_lag = n;
        self
    }

    /// Report jobs as running for `polls` status checks before they finish
    #[must_use]
    pub fn with_job_polls(mut self, polls: u32) -> Self {
        self.job_polls = polls;
        self
    }

    /// Make every load job finish with this error
    #[must_use]
    pub fn with_failing_jobs(mut self, message: impl Into<String>) -> Self {
        self.fail_jobs = Some(message.into());
        self
    }

    /// Store the rows of the next `n` inserts but answer them with a timeout
    ///
    /// Emulates a response lost after the warehouse accepted the request.
    #[must_use]
    pub fn with_lost_acks(mut self, n: u32) -> Self {
        self.state.get_mut().lost_acks = n;
        self
    }

    /// Add a table with existing rows
    pub async fn seed_table(&self, spec: TableSpec, rows: Vec<JsonValue>) {
        let mut state = self.state.lock().await;
        state.tables.insert(
            spec.table,
            MemoryTable {
                schema: Some(spec.schema),
                time_partitioning: spec.time_partitioning,
                rows,
            },
        );
    }

    /// Recorded calls in order
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Batch id sent with each insert call, in order
    pub async fn insert_batch_ids(&self) -> Vec<String> {
        self.state.lock().await.insert_batches.clone()
    }

    /// Snapshot of a table
    pub async fn table(&self, table: &TableRef) -> Option<MemoryTable> {
        self.state.lock().await.tables.get(table).cloned()
    }

    /// Rows of a table, empty when absent
    pub async fn rows(&self, table: &TableRef) -> Vec<JsonValue> {
        self.table(table)
            .await
            .map(|t| t.rows)
            .unwrap_or_default()
    }

    /// Run a load job against the in-memory tables
    fn apply_load(state: &mut State, job: &LoadJobSpec, rows: &[JsonValue]) -> Result<()> {
        let exists = state.tables.contains_key(&job.destination);
        if !exists && job.create_disposition == CreateDisposition::CreateNever {
            return Err(Error::TableNotFound {
                table: job.destination.to_string(),
            });
        }

        let table = state.tables.entry(job.destination.clone()).or_default();
        if table.schema.is_none() {
            table.schema.clone_from(&job.schema);
        }

        match job.write_disposition {
            WriteDisposition::WriteAppend => table.rows.extend_from_slice(rows),
            WriteDisposition::WriteTruncate => table.rows = rows.to_vec(),
            WriteDisposition::WriteEmpty => {
                if !table.rows.is_empty() {
                    return Err(Error::store(format!(
                        "Table {} is not empty",
                        job.destination
                    )));
                }
                table.rows = rows.to_vec();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_table(&self, table: &TableRef) -> Result<Option<TableInfo>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::GetTable(table.to_string()));

        Ok(state.tables.get(table).map(|t| TableInfo {
            table: table.clone(),
            schema: t.schema.clone(),
            time_partitioning: t.time_partitioning.clone(),
            num_rows: Some(t.rows.len() as u64),
        }))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::CreateTable(spec.table.to_string()));

        if state.tables.contains_key(&spec.table) {
            return Err(Error::store(format!(
                "Already Exists: Table {}",
                spec.table
            )));
        }

        state.tables.insert(
            spec.table.clone(),
            MemoryTable {
                schema: Some(spec.schema.clone()),
                time_partitioning: spec.time_partitioning.clone(),
                rows: Vec::new(),
            },
        );
        if self.insert_lag > 0 {
            state.lagging.insert(spec.table.clone(), self.insert_lag);
        }

        Ok(TableInfo {
            table: spec.table.clone(),
            schema: Some(spec.schema.clone()),
            time_partitioning: spec.time_partitioning.clone(),
            num_rows: Some(0),
        })
    }

    async fn insert_rows(&self, table: &TableRef, batch: &InsertBatch<'_>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::InsertRows {
            table: table.to_string(),
            rows: batch.len(),
        });
        state.insert_batches.push(batch.batch_id().to_string());

        if let Some(remaining) = state.lagging.get_mut(table) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!("Rejecting insert into {} ({} left)", table, remaining);
                return Err(Error::insert(
                    table.to_string(),
                    format!("Not found: Table {table}"),
                ));
            }
        }

        let State {
            tables,
            insert_ids,
            lost_acks,
            ..
        } = &mut *state;
        let Some(t) = tables.get_mut(table) else {
            return Err(Error::insert(
                table.to_string(),
                format!("Not found: Table {table}"),
            ));
        };

        let seen = insert_ids.entry(table.clone()).or_default();
        let mut duplicates = 0;
        for (insert_id, row) in batch.entries() {
            if seen.insert(insert_id) {
                t.rows.push(row.clone());
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            debug!("Dropped {} duplicate rows for {}", duplicates, table);
        }

        if *lost_acks > 0 {
            *lost_acks -= 1;
            return Err(Error::Timeout { timeout_ms: 0 });
        }
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::DeleteTable(table.to_string()));
        state.lagging.remove(table);
        state.insert_ids.remove(table);
        Ok(state.tables.remove(table).is_some())
    }

    async fn submit_load_job(&self, job: &LoadJobSpec, rows: &[JsonValue]) -> Result<JobHandle> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::SubmitLoadJob {
            table: job.destination.to_string(),
            rows: rows.len(),
        });

        state.next_job += 1;
        let job_id = format!("job_{}", state.next_job);

        let error = match &self.fail_jobs {
            Some(message) => Some(message.clone()),
            None => Self::apply_load(&mut state, job, rows)
                .err()
                .map(|e| e.to_string()),
        };

        state.jobs.insert(
            job_id.clone(),
            MemoryJob {
                polls_left: self.job_polls,
                error,
            },
        );

        Ok(JobHandle {
            project: job.destination.project.clone(),
            job_id,
            location: None,
        })
    }

    async fn get_job(&self, job: &JobHandle) -> Result<JobStatus> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::GetJob(job.job_id.clone()));

        let entry = state
            .jobs
            .get_mut(&job.job_id)
            .ok_or_else(|| Error::store(format!("Not found: Job {}", job.job_id)))?;

        if entry.polls_left > 0 {
            entry.polls_left -= 1;
            return Ok(JobStatus {
                state: JobState::Running,
                error: None,
            });
        }

        Ok(JobStatus {
            state: JobState::Done,
            error: entry.error.clone(),
        })
    }
}
