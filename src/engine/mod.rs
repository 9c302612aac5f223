//! Pipeline engine
//!
//! Runs one trigger request end to end: resolve the requested fetcher and
//! loader, resolve the date window and destination, fetch every page, then
//! load the batch.
//!
//! # Overview
//!
//! - `Pipeline` - holds the clients and tunables shared across runs
//! - `RunRequest` - the trigger body
//! - `RunPlan` - a request resolved without any remote call
//! - `RunReport` - what happened

mod types;

pub use types::{
    FetchParameters, FetchRequest, LoadParameters, LoadRequest, RunPlan, RunReport, RunRequest,
};

use crate::config::Settings;
use crate::dates::DateResolver;
use crate::error::{Error, Result};
use crate::fetch::{FetchParams, FetcherKind};
use crate::http::HttpClient;
use crate::loader::{LoadOptions, LoaderConfig, LoaderKind};
use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::schema::SchemaRegistry;
use crate::store::{BigQueryStore, MemoryStore, TableRef, TableStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Prefix of derived table names
pub const DEFAULT_TABLE_PREFIX: &str = "freshdesk_time_entries";

/// Fetch-then-load pipeline
pub struct Pipeline {
    /// Freshdesk client
    freshdesk: Arc<HttpClient>,
    /// Destination
    store: Arc<dyn TableStore>,
    /// Declared schemas for load jobs
    registry: Arc<SchemaRegistry>,
    /// Date token resolution
    resolver: DateResolver,
    /// Loader tunables
    loader_config: LoaderConfig,
    /// Page size when the request has none
    page_size: u32,
}

impl Pipeline {
    /// Create a pipeline with default tunables and no declared schemas
    pub fn new(freshdesk: HttpClient, store: Arc<dyn TableStore>) -> Self {
        Self {
            freshdesk: Arc::new(freshdesk),
            store,
            registry: Arc::new(SchemaRegistry::new()),
            resolver: DateResolver::new(),
            loader_config: LoaderConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Wire a pipeline from settings
    ///
    /// With `dry_run` the destination is an in-memory store and no Google
    /// credentials are needed.
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Result<Self> {
        let freshdesk = HttpClient::with_auth(
            settings.freshdesk_client_config()?,
            settings.freshdesk_auth()?,
        )?;

        let store: Arc<dyn TableStore> = if dry_run {
            Arc::new(MemoryStore::new())
        } else {
            let client = HttpClient::with_auth(
                settings.http_client_config(settings.bigquery.endpoint.clone()),
                settings.bigquery_auth()?,
            )?;
            Arc::new(BigQueryStore::new(client))
        };

        let registry = SchemaRegistry::from_file(&settings.bigquery.schema_file)?;
        info!(
            "Loaded {} declared schemas from {}",
            registry.len(),
            settings.bigquery.schema_file.display()
        );

        Ok(Self::new(freshdesk, store)
            .with_registry(registry)
            .with_loader_config(settings.loader_config())
            .with_page_size(settings.freshdesk.page_size))
    }

    /// Set declared schemas
    #[must_use]
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Set the date resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: DateResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set loader tunables
    #[must_use]
    pub fn with_loader_config(mut self, config: LoaderConfig) -> Self {
        self.loader_config = config;
        self
    }

    /// Set the default page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Get the destination store
    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    /// Get the date resolver
    pub fn resolver(&self) -> &DateResolver {
        &self.resolver
    }

    /// Resolve a request without touching either API
    ///
    /// Unknown names, bad date tokens and bad dispositions all fail here.
    pub fn plan(&self, request: &RunRequest) -> Result<RunPlan> {
        let fetcher: FetcherKind = request.freshdesk.function_name.parse()?;
        let loader: LoaderKind = request.bigquery.function_name.parse()?;

        let fp = &request.freshdesk.function_parameters;
        let window = self
            .resolver
            .window(fp.executed_after.as_deref(), fp.executed_before.as_deref())?;
        let page_size = fp.per_page.unwrap_or(self.page_size);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "per_page",
                format!("must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"),
            ));
        }
        let params = FetchParams::new(window)
            .from_page(fp.page.unwrap_or(1))
            .with_page_size(page_size);

        let lp = &request.bigquery.function_parameters;
        let table_name = match lp.table_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.default_table_name(lp.update_last_month),
        };
        let table = TableRef::new(&lp.project_name, &lp.dataset_name, table_name);

        let options = LoadOptions {
            replace_existing: lp.update_last_month,
            write_disposition: parse_or_default(lp.write_disposition.as_deref())?,
            create_disposition: parse_or_default(lp.create_disposition.as_deref())?,
            schema_name: Some(fetcher.name().to_string()),
        };

        Ok(RunPlan {
            fetcher,
            loader,
            params,
            table,
            options,
        })
    }

    /// `freshdesk_time_entries_YYYYMM`
    pub fn default_table_name(&self, last_month: bool) -> String {
        format!(
            "{}_{}",
            DEFAULT_TABLE_PREFIX,
            self.resolver.table_suffix(last_month)
        )
    }

    /// Run one request
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let plan = self.plan(request)?;
        self.execute(plan).await
    }

    /// Run an already resolved plan
    pub async fn execute(&self, plan: RunPlan) -> Result<RunReport> {
        let start = Instant::now();
        info!(
            "Running {} -> {} into {} (window {:?})",
            plan.fetcher.name(),
            plan.loader.name(),
            plan.table,
            plan.params.window
        );

        let fetcher = plan.fetcher.build(Arc::clone(&self.freshdesk));
        let output = fetcher.fetch(&plan.params).await?;

        let loader = plan.loader.build(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.loader_config.clone(),
        );
        let outcome = loader
            .load(&output.records, &plan.table, &plan.options)
            .await?;

        info!(
            "Run finished in {}ms: {} records from {} pages",
            start.elapsed().as_millis(),
            output.len(),
            output.stats.pages_fetched
        );

        Ok(RunReport {
            fetcher: fetcher.name(),
            loader: loader.name(),
            records: output.len(),
            pages: output.stats.pages_fetched,
            table: plan.table,
            outcome,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("freshdesk", &self.freshdesk.config().base_url)
            .field("schemas", &self.registry.len())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Parse an optional disposition, falling back to its default
fn parse_or_default<T>(value: Option<&str>) -> Result<T>
where
    T: std::str::FromStr<Err = Error> + Default,
{
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => s.parse(),
        _ => Ok(T::default()),
    }
}
