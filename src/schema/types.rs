//! Schema types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BigQuery column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    String,
    Bytes,
    Integer,
    Float,
    Numeric,
    BigNumeric,
    Boolean,
    Timestamp,
    Date,
    Time,
    DateTime,
    Geography,
    Json,
    Record,
}

impl FieldType {
    /// Canonical name used in the REST API
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Numeric => "NUMERIC",
            FieldType::BigNumeric => "BIGNUMERIC",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Geography => "GEOGRAPHY",
            FieldType::Json => "JSON",
            FieldType::Record => "RECORD",
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => FieldType::String,
            "BYTES" => FieldType::Bytes,
            "INTEGER" | "INT64" => FieldType::Integer,
            "FLOAT" | "FLOAT64" => FieldType::Float,
            "NUMERIC" => FieldType::Numeric,
            "BIGNUMERIC" => FieldType::BigNumeric,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "TIMESTAMP" => FieldType::Timestamp,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "DATETIME" => FieldType::DateTime,
            "GEOGRAPHY" => FieldType::Geography,
            "JSON" => FieldType::Json,
            "RECORD" | "STRUCT" => FieldType::Record,
            _ => {
                return Err(Error::schema(
                    "type",
                    format!("Unsupported field type '{s}'"),
                ))
            }
        };
        Ok(ty)
    }
}

impl TryFrom<String> for FieldType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    /// Canonical name used in the REST API
    pub fn as_str(self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }
}

impl FromStr for FieldMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NULLABLE" => Ok(FieldMode::Nullable),
            "REQUIRED" => Ok(FieldMode::Required),
            "REPEATED" => Ok(FieldMode::Repeated),
            _ => Err(Error::schema("mode", format!("Unsupported field mode '{s}'"))),
        }
    }
}

impl TryFrom<String> for FieldMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldMode> for String {
    fn from(value: FieldMode) -> Self {
        value.as_str().to_string()
    }
}

/// One column definition, possibly nested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Column mode, NULLABLE when absent
    #[serde(default)]
    pub mode: FieldMode,
    /// Sub-fields of a RECORD
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
}

impl SchemaField {
    /// A NULLABLE scalar column
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
            fields: Vec::new(),
        }
    }

    /// A RECORD column with sub-fields
    pub fn record(name: impl Into<String>, mode: FieldMode, fields: Vec<SchemaField>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Record,
            mode,
            fields,
        }
    }

    /// Set the mode
    #[must_use]
    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check RECORD/sub-field consistency at every depth
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::schema("name", "Field name is empty"));
        }

        match (self.field_type, self.fields.is_empty()) {
            (FieldType::Record, true) => Err(Error::schema(
                &self.name,
                "RECORD field must declare sub-fields",
            )),
            (FieldType::Record, false) => self.fields.iter().try_for_each(SchemaField::validate),
            (_, false) => Err(Error::schema(
                &self.name,
                format!("{} field cannot have sub-fields", self.field_type),
            )),
            (_, true) => Ok(()),
        }
    }

    /// Number of leaf columns under this field
    pub fn leaf_count(&self) -> usize {
        if self.fields.is_empty() {
            1
        } else {
            self.fields.iter().map(SchemaField::leaf_count).sum()
        }
    }
}

/// Ordered list of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Top-level columns
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    /// Create a schema from columns
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Find a top-level column
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Top-level column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Number of top-level columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate every column
    pub fn validate(&self) -> Result<()> {
        self.fields.iter().try_for_each(SchemaField::validate)
    }
}

/// Fixed schema of Freshdesk time entries
pub fn time_entries_schema() -> TableSchema {
    use FieldType::{Boolean, Integer, Timestamp};

    TableSchema::new(vec![
        SchemaField::nullable("billable", Boolean),
        SchemaField::nullable("note", FieldType::String),
        SchemaField::nullable("id", FieldType::String),
        SchemaField::nullable("timer_running", Boolean),
        SchemaField::nullable("agent_id", FieldType::String),
        SchemaField::nullable("ticket_id", FieldType::String),
        SchemaField::nullable("company_id", FieldType::String),
        SchemaField::nullable("time_spent", FieldType::String),
        SchemaField::nullable("executed_at", Timestamp),
        SchemaField::nullable("start_time", Timestamp),
        SchemaField::nullable("created_at", Timestamp),
        SchemaField::nullable("updated_at", Timestamp),
        SchemaField::nullable("time_spent_in_seconds", Integer),
    ])
}
