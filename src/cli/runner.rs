//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::cli::server::{serve, ServerConfig};
use crate::config::Settings;
use crate::dates::{format_timestamp, DateResolver};
use crate::engine::{Pipeline, RunRequest, DEFAULT_TABLE_PREFIX};
use crate::error::{Error, Result};
use crate::schema::SchemaRegistry;
use std::fs;
use std::path::Path;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Serve { port } => self.serve(*port).await,
            Commands::Run {
                file,
                request_json,
                plan,
            } => {
                let request = read_request(file.as_deref(), request_json.as_deref())?;
                self.run_request(&request, *plan).await
            }
            Commands::Resolve { tokens, tables } => {
                let resolver = DateResolver::new();
                for line in resolve_lines(&resolver, tokens, *tables)? {
                    println!("{line}");
                }
                Ok(())
            }
            Commands::Schema { name } => self.schema(name.as_deref()),
        }
    }

    /// Load settings from the optional file and the environment
    fn settings(&self) -> Result<Settings> {
        Settings::load(self.cli.config.as_deref())
    }

    async fn serve(&self, port: Option<u16>) -> Result<()> {
        let settings = self.settings()?;
        let pipeline = Pipeline::from_settings(&settings, self.cli.dry_run)?;
        let config = ServerConfig {
            host: settings.server.host.clone(),
            port: port.unwrap_or(settings.server.port),
        };
        serve(pipeline, config).await
    }

    async fn run_request(&self, request: &RunRequest, plan_only: bool) -> Result<()> {
        let settings = self.settings()?;
        let pipeline = Pipeline::from_settings(&settings, self.cli.dry_run)?;

        if plan_only {
            let plan = pipeline.plan(request)?;
            println!("{plan:#?}");
            return Ok(());
        }

        let report = pipeline.run(request).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn schema(&self, name: Option<&str>) -> Result<()> {
        let settings = self.settings()?;
        let registry = SchemaRegistry::from_file(&settings.bigquery.schema_file)?;

        match name {
            Some(name) => {
                let schema = registry.get(name).ok_or_else(|| {
                    Error::config(format!(
                        "No schema named '{name}' in {}",
                        settings.bigquery.schema_file.display()
                    ))
                })?;
                println!("{}", serde_json::to_string_pretty(&schema.fields)?);
            }
            None => {
                for name in registry.names() {
                    println!("{name}");
                }
            }
        }
        Ok(())
    }
}

/// Read a request from a file or inline JSON
fn read_request(file: Option<&Path>, inline: Option<&str>) -> Result<RunRequest> {
    let json = match (file, inline) {
        (Some(path), _) => fs::read_to_string(path).map_err(|_| Error::FileNotFound {
            path: path.display().to_string(),
        })?,
        (None, Some(json)) => json.to_string(),
        (None, None) => {
            return Err(Error::config(
                "No request given (use --file or --request-json)",
            ))
        }
    };
    Ok(serde_json::from_str(&json)?)
}

/// One `token<TAB>timestamp` line per token, then optional table names
fn resolve_lines(resolver: &DateResolver, tokens: &[String], tables: bool) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(tokens.len() + 2);
    for token in tokens {
        let ts = resolver.resolve(token)?;
        lines.push(format!("{token}\t{}", format_timestamp(ts)));
    }
    if tables {
        lines.push(format!(
            "table\t{DEFAULT_TABLE_PREFIX}_{}",
            resolver.table_suffix(false)
        ));
        lines.push(format!(
            "table (update_last_month)\t{DEFAULT_TABLE_PREFIX}_{}",
            resolver.table_suffix(true)
        ));
    }
    Ok(lines)
}
