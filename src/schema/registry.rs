//! Named schemas loaded from a JSON file
//!
//! The file maps a schema name to its column list:
//!
//! ```json
//! { "TimeEntries": [ {"name": "id", "type": "STRING"}, ... ] }
//! ```

use super::types::{SchemaField, TableSchema};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Registry of declared table schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<SchemaField>> = serde_json::from_str(json)?;
        let mut schemas = BTreeMap::new();

        for (name, fields) in raw {
            let schema = TableSchema::new(fields);
            schema.validate().map_err(|e| match e {
                Error::Schema { field, message } => Error::Schema {
                    field: format!("{name}.{field}"),
                    message,
                },
                other => other,
            })?;
            schemas.insert(name, schema);
        }

        Ok(Self { schemas })
    }

    /// Read a registry file; a missing file yields an empty registry
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Schema file {} not found, no declared schemas",
                path.display()
            );
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Register a schema under a name
    pub fn insert(&mut self, name: impl Into<String>, schema: TableSchema) {
        self.schemas.insert(name.into(), schema);
    }

    /// Look up a schema by name
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.schemas.get(name)
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schemas are declared
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromStr for SchemaRegistry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json(s)
    }
}
