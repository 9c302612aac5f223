//! Loader options, outcomes and retry policy

use crate::store::{CreateDisposition, WriteDisposition};
use crate::types::BackoffType;
use serde::Serialize;
use std::time::Duration;

/// What a load did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// No records, nothing touched
    Skipped,
    /// Rows appended to an existing table in one call
    Appended {
        /// Rows written
        rows: usize,
    },
    /// Table created, then rows inserted
    CreatedAndInserted {
        /// Rows written
        rows: usize,
        /// Insert attempts it took
        attempts: u32,
    },
    /// Load job finished successfully
    JobCompleted {
        /// Job id
        job_id: String,
        /// Rows uploaded
        rows: usize,
        /// Whether the schema was inferred
        autodetect: bool,
    },
}

impl LoadOutcome {
    /// Rows written
    pub fn rows(&self) -> usize {
        match self {
            Self::Skipped => 0,
            Self::Appended { rows }
            | Self::CreatedAndInserted { rows, .. }
            | Self::JobCompleted { rows, .. } => *rows,
        }
    }
}

/// Per-load options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Drop the table before loading
    pub replace_existing: bool,
    /// Load job write disposition
    pub write_disposition: WriteDisposition,
    /// Load job create disposition
    pub create_disposition: CreateDisposition,
    /// Registry key of the declared schema
    pub schema_name: Option<String>,
}

/// Bounded retry for inserts into a freshly created table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Delay growth
    pub backoff: BackoffType,
    /// Overall time budget, unbounded when `None`
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff: BackoffType::Exponential,
            deadline: Some(Duration::from_secs(600)),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffType::Constant,
            deadline: None,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay(
            attempt.saturating_sub(1),
            self.initial_delay,
            self.max_delay,
        )
    }

    /// Whether another attempt fits after `attempt` attempts and `elapsed` time
    pub fn allows_retry(&self, attempt: u32, elapsed: Duration) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match self.deadline {
            Some(deadline) => elapsed + self.delay_after(attempt) <= deadline,
            None => true,
        }
    }
}

/// Tunables shared by all loaders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Insert retry after table creation
    pub retry: RetryPolicy,
    /// Pause after dropping a table before recreating it
    pub replace_pause: Duration,
    /// Interval between load job status checks
    pub poll_interval: Duration,
    /// Longest wait for a load job
    pub job_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            replace_pause: Duration::from_secs(15),
            poll_interval: Duration::from_secs(2),
            job_timeout: Duration::from_secs(600),
        }
    }
}

impl LoaderConfig {
    /// No waiting anywhere, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy::immediate(5),
            replace_pause: Duration::ZERO,
            poll_interval: Duration::ZERO,
            job_timeout: Duration::from_secs(30),
        }
    }
}

/// Phases of a load job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing decided yet
    Start,
    /// Declared schema found in the registry
    SchemaFound,
    /// No declared schema, the service infers one
    Autodetect,
    /// Job accepted by the service
    Submitted,
    /// Polling for completion
    Waiting,
    /// Job finished without error
    Success,
    /// Job finished with an error
    Failure,
}

impl LoadPhase {
    /// Whether the job is over
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Whether `next` may follow this phase
    pub fn can_transition_to(self, next: LoadPhase) -> bool {
        use LoadPhase::{Autodetect, Failure, SchemaFound, Start, Submitted, Success, Waiting};

        matches!(
            (self, next),
            (Start, SchemaFound | Autodetect | Failure)
                | (SchemaFound | Autodetect, Submitted | Failure)
                | (Submitted | Waiting, Waiting | Success | Failure)
        )
    }
}
