//! Destination table schemas
//!
//! # Features
//!
//! - **Column Types**: BigQuery types with their standard SQL aliases
//! - **Nested Records**: RECORD columns validated recursively
//! - **Registry**: Named schemas read from a JSON file
//! - **Time Entries**: The fixed schema of the streaming loader

mod registry;
mod types;

pub use registry::SchemaRegistry;
pub use types::{time_entries_schema, FieldMode, FieldType, SchemaField, TableSchema};

#[cfg(test)]
mod tests;
