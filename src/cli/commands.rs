//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Freshdesk time entries to BigQuery
#[derive(Parser, Debug)]
#[command(name = "freshdesk-bq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short = 'C', long, global = true, env = "FRESHDESK_BQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load into an in-memory table instead of BigQuery
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP trigger server
    Serve {
        /// Port to listen on (overrides settings and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one pipeline request
    Run {
        /// Request file (JSON)
        #[arg(short, long, conflicts_with = "request_json")]
        file: Option<PathBuf>,

        /// Inline request JSON
        #[arg(long)]
        request_json: Option<String>,

        /// Resolve the request and print the plan without fetching
        #[arg(long)]
        plan: bool,
    },

    /// Print resolved date tokens
    Resolve {
        /// Tokens such as yesterday, last_month or 2024-05-16
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Print the default table name suffixes too
        #[arg(long)]
        tables: bool,
    },

    /// Print a declared schema
    Schema {
        /// Registry key; lists names when omitted
        name: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_inline() {
        let cli = Cli::try_parse_from([
            "freshdesk-bq",
            "--dry-run",
            "run",
            "--request-json",
            "{}",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Run {
                file,
                request_json,
                plan,
            } => {
                assert!(file.is_none());
                assert_eq!(request_json.as_deref(), Some("{}"));
                assert!(!plan);
            }
            other => panic!("Expected Run, got {other:?}"),
        }
    }

    #[test]
    fn test_run_file_and_inline_conflict() {
        let result = Cli::try_parse_from([
            "freshdesk-bq",
            "run",
            "--file",
            "req.json",
            "--request-json",
            "{}",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_resolve_and_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "freshdesk-bq",
            "resolve",
            "yesterday",
            "last_month",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Resolve { tokens, tables } => {
                assert_eq!(tokens, vec!["yesterday", "last_month"]);
                assert!(!tables);
            }
            other => panic!("Expected Resolve, got {other:?}"),
        }
    }
}
