//! Destination store types

use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fully qualified destination table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// GCP project
    pub project: String,
    /// Dataset within the project
    pub dataset: String,
    /// Table within the dataset
    pub table: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Ingestion-time or column partitioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePartitioning {
    /// Partition granularity (`DAY`, `HOUR`, `MONTH`, `YEAR`)
    #[serde(rename = "type")]
    pub partition_type: String,
    /// Partitioning column, ingestion time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TimePartitioning {
    /// Daily partitions on ingestion time
    pub fn day() -> Self {
        Self {
            partition_type: "DAY".to_string(),
            field: None,
        }
    }
}

/// Definition of a table to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Where to create it
    pub table: TableRef,
    /// Column definitions
    pub schema: TableSchema,
    /// Partitioning
    pub time_partitioning: Option<TimePartitioning>,
}

/// Metadata of an existing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// The table
    pub table: TableRef,
    /// Column definitions, when reported
    pub schema: Option<TableSchema>,
    /// Partitioning, when set
    pub time_partitioning: Option<TimePartitioning>,
    /// Row count, when reported
    pub num_rows: Option<u64>,
}

/// Rows for one streaming insert, tagged for de-duplication
///
/// Row `i` carries the insert id `{batch_id}-{i}`. The ids are fixed when
/// the batch is built, so sending the same batch again lets the warehouse
/// drop rows it already accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertBatch<'a> {
    batch_id: String,
    rows: &'a [JsonValue],
}

impl<'a> InsertBatch<'a> {
    /// Tag `rows` with a fresh batch id
    pub fn new(rows: &'a [JsonValue]) -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string(), rows)
    }

    /// Tag `rows` with a known batch id
    pub fn with_id(batch_id: impl Into<String>, rows: &'a [JsonValue]) -> Self {
        Self {
            batch_id: batch_id.into(),
            rows,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn rows(&self) -> &'a [JsonValue] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert id of the row at `index`
    pub fn insert_id(&self, index: usize) -> String {
        format!("{}-{index}", self.batch_id)
    }

    /// Rows paired with their insert ids
    pub fn entries(&self) -> impl Iterator<Item = (String, &'a JsonValue)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (self.insert_id(index), row))
    }
}

/// What a load job does with existing table data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Append rows
    #[default]
    WriteAppend,
    /// Replace the table contents
    WriteTruncate,
    /// Only write into an empty table
    WriteEmpty,
}

impl WriteDisposition {
    /// REST API name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteAppend => "WRITE_APPEND",
            Self::WriteTruncate => "WRITE_TRUNCATE",
            Self::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

impl FromStr for WriteDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WRITE_APPEND" => Ok(Self::WriteAppend),
            "WRITE_TRUNCATE" => Ok(Self::WriteTruncate),
            "WRITE_EMPTY" => Ok(Self::WriteEmpty),
            other => Err(Error::InvalidDisposition {
                kind: "write",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a load job may create its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    /// Create the table when missing
    #[default]
    CreateIfNeeded,
    /// Fail when the table is missing
    CreateNever,
}

impl CreateDisposition {
    /// REST API name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateIfNeeded => "CREATE_IF_NEEDED",
            Self::CreateNever => "CREATE_NEVER",
        }
    }
}

impl FromStr for CreateDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE_IF_NEEDED" => Ok(Self::CreateIfNeeded),
            "CREATE_NEVER" => Ok(Self::CreateNever),
            other => Err(Error::InvalidDisposition {
                kind: "create",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CreateDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A newline-delimited JSON load job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobSpec {
    /// Destination table
    pub destination: TableRef,
    /// Declared schema, autodetect when absent
    pub schema: Option<TableSchema>,
    /// Write disposition
    pub write_disposition: WriteDisposition,
    /// Create disposition
    pub create_disposition: CreateDisposition,
}

impl LoadJobSpec {
    /// Whether the service should infer the schema
    pub fn autodetect(&self) -> bool {
        self.schema.is_none()
    }
}

/// Handle of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Project running the job
    pub project: String,
    /// Job id
    pub job_id: String,
    /// Job location, when reported
    pub location: Option<String>,
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Queued
    Pending,
    /// Executing
    Running,
    /// Finished, successfully or not
    Done,
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            other => Err(Error::store(format!("Unknown job state '{other}'"))),
        }
    }
}

/// Status of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Current state
    pub state: JobState,
    /// Error result of a finished job
    pub error: Option<String>,
}

impl JobStatus {
    /// Whether the job finished
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}
