//! CLI module
//!
//! Command-line interface for the pipeline.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP trigger server
//! - `run` - Run one request from a file or inline JSON
//! - `resolve` - Print resolved date tokens
//! - `schema` - Print declared schemas

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands};
pub use runner::Runner;
pub use server::{router, serve, ServerConfig, SUCCESS_BODY};
