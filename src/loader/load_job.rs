//! Schema-driven load-job loader

use super::types::{LoadOptions, LoadOutcome, LoadPhase, LoaderConfig};
use super::Loader;
use crate::error::{Error, Result};
use crate::schema::SchemaRegistry;
use crate::store::{JobHandle, LoadJobSpec, TableRef, TableStore};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Uploads records as one newline-delimited JSON load job
pub struct LoadJobLoader {
    store: Arc<dyn TableStore>,
    registry: Arc<SchemaRegistry>,
    config: LoaderConfig,
}

/// Phase tracking for one job
struct JobRun {
    phase: LoadPhase,
}

impl JobRun {
    fn new() -> Self {
        Self {
            phase: LoadPhase::Start,
        }
    }

    fn enter(&mut self, next: LoadPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid load phase transition {:?} -> {next:?}",
            self.phase
        );
        debug!("Load job phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Pass a store result through, ending the run on error
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() && !self.phase.is_terminal() {
            self.enter(LoadPhase::Failure);
        }
        result
    }
}

impl LoadJobLoader {
    /// Create a loader over a store and a schema registry
    pub fn new(
        store: Arc<dyn TableStore>,
        registry: Arc<SchemaRegistry>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Poll until the job is done or the timeout passes
    async fn wait(&self, run: &mut JobRun, handle: &JobHandle) -> Result<()> {
        let start = Instant::now();

        loop {
            let status = run.settle(self.store.get_job(handle).await)?;
            if status.is_done() {
                return match status.error {
                    None => {
                        run.enter(LoadPhase::Success);
                        Ok(())
                    }
                    Some(message) => {
                        run.enter(LoadPhase::Failure);
                        Err(Error::LoadJob {
                            job_id: handle.job_id.clone(),
                            message,
                        })
                    }
                };
            }

            if start.elapsed() >= self.config.job_timeout {
                run.enter(LoadPhase::Failure);
                return Err(Error::LoadJob {
                    job_id: handle.job_id.clone(),
                    message: format!(
                        "not finished after {:?}",
                        self.config.job_timeout
                    ),
                });
            }

            run.enter(LoadPhase::Waiting);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl Loader for LoadJobLoader {
    fn name(&self) -> &'static str {
        "InsertJson"
    }

    async fn load(
        &self,
        records: &[JsonValue],
        table: &TableRef,
        options: &LoadOptions,
    ) -> Result<LoadOutcome> {
        if records.is_empty() {
            info!("No records to load into {}", table);
            return Ok(LoadOutcome::Skipped);
        }

        let mut run = JobRun::new();
        let schema = options
            .schema_name
            .as_deref()
            .and_then(|name| self.registry.get(name))
            .cloned();

        match &schema {
            Some(_) => run.enter(LoadPhase::SchemaFound),
            None => run.enter(LoadPhase::Autodetect),
        }

        let spec = LoadJobSpec {
            destination: table.clone(),
            schema,
            write_disposition: options.write_disposition,
            create_disposition: options.create_disposition,
        };
        let autodetect = spec.autodetect();

        let handle = run.settle(self.store.submit_load_job(&spec, records).await)?;
        run.enter(LoadPhase::Submitted);

        self.wait(&mut run, &handle).await?;

        info!(
            "Load job {} loaded {} rows into {} ({}, {})",
            handle.job_id,
            records.len(),
            table,
            spec.write_disposition,
            if autodetect { "autodetect" } else { "declared schema" }
        );

        Ok(LoadOutcome::JobCompleted {
            job_id: handle.job_id,
            rows: records.len(),
            autodetect,
        })
    }
}
