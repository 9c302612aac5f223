//! Schema tests

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use test_case::test_case;

#[test_case("STRING", FieldType::String)]
#[test_case("int64", FieldType::Integer)]
#[test_case("INTEGER", FieldType::Integer)]
#[test_case("FLOAT64", FieldType::Float)]
#[test_case("bool", FieldType::Boolean)]
#[test_case("STRUCT", FieldType::Record)]
#[test_case(" timestamp ", FieldType::Timestamp)]
#[test_case("DATETIME", FieldType::DateTime)]
fn test_field_type_parse(input: &str, expected: FieldType) {
    assert_eq!(input.parse::<FieldType>().unwrap(), expected);
}

#[test]
fn test_field_type_unknown() {
    let err = "VARCHAR".parse::<FieldType>().unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert!(err.to_string().contains("VARCHAR"));
}

#[test]
fn test_field_mode_default_and_parse() {
    assert_eq!(FieldMode::default(), FieldMode::Nullable);
    assert_eq!("repeated".parse::<FieldMode>().unwrap(), FieldMode::Repeated);
    assert!("OPTIONAL".parse::<FieldMode>().is_err());
}

#[test]
fn test_time_entries_schema() {
    let schema = time_entries_schema();

    assert_eq!(schema.len(), 13);
    assert_eq!(
        schema.column_names(),
        vec![
            "billable",
            "note",
            "id",
            "timer_running",
            "agent_id",
            "ticket_id",
            "company_id",
            "time_spent",
            "executed_at",
            "start_time",
            "created_at",
            "updated_at",
            "time_spent_in_seconds",
        ]
    );
    assert!(schema.fields.iter().all(|f| f.mode == FieldMode::Nullable));
    assert_eq!(
        schema.field("time_spent_in_seconds").unwrap().field_type,
        FieldType::Integer
    );
    assert_eq!(
        schema.field("executed_at").unwrap().field_type,
        FieldType::Timestamp
    );
    schema.validate().unwrap();
}

#[test]
fn test_schema_serializes_to_rest_shape() {
    let schema = TableSchema::new(vec![
        SchemaField::nullable("id", FieldType::String),
        SchemaField::record(
            "agent",
            FieldMode::Required,
            vec![SchemaField::nullable("email", FieldType::String)],
        ),
    ]);

    let value = serde_json::to_value(&schema).unwrap();
    assert_eq!(
        value,
        json!({
            "fields": [
                {"name": "id", "type": "STRING", "mode": "NULLABLE"},
                {
                    "name": "agent",
                    "type": "RECORD",
                    "mode": "REQUIRED",
                    "fields": [{"name": "email", "type": "STRING", "mode": "NULLABLE"}]
                }
            ]
        })
    );
}

#[test]
fn test_registry_expands_nested_records() {
    let registry = SchemaRegistry::from_json(
        r#"{
            "TimeEntries": [
                {"name": "id", "type": "STRING"},
                {"name": "meta", "type": "RECORD", "mode": "REPEATED", "fields": [
                    {"name": "source", "type": "STRING", "mode": "REQUIRED"},
                    {"name": "location", "type": "RECORD", "fields": [
                        {"name": "lat", "type": "FLOAT64"},
                        {"name": "lng", "type": "FLOAT64"}
                    ]}
                ]}
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(registry.len(), 1);
    let schema = registry.get("TimeEntries").unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.field("id").unwrap().mode, FieldMode::Nullable);

    let meta = schema.field("meta").unwrap();
    assert_eq!(meta.field_type, FieldType::Record);
    assert_eq!(meta.mode, FieldMode::Repeated);
    assert_eq!(meta.fields[0].mode, FieldMode::Required);

    let location = &meta.fields[1];
    assert_eq!(location.mode, FieldMode::Nullable);
    assert_eq!(location.fields.len(), 2);
    assert_eq!(location.fields[0].field_type, FieldType::Float);
    assert_eq!(meta.leaf_count(), 3);
}

#[test]
fn test_registry_record_without_fields() {
    let err = SchemaRegistry::from_json(
        r#"{"Broken": [{"name": "meta", "type": "RECORD"}]}"#,
    )
    .unwrap_err();

    match err {
        Error::Schema { field, .. } => assert_eq!(field, "Broken.meta"),
        other => panic!("Expected Schema error, got {other:?}"),
    }
}

#[test]
fn test_registry_scalar_with_fields() {
    let err = SchemaRegistry::from_json(
        r#"{"Broken": [{"name": "id", "type": "STRING", "fields": [{"name": "x", "type": "STRING"}]}]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("cannot have sub-fields"));
}

#[test]
fn test_registry_unknown_type() {
    let err = SchemaRegistry::from_json(r#"{"Bad": [{"name": "id", "type": "VARCHAR"}]}"#)
        .unwrap_err();
    assert!(matches!(err, Error::JsonParse(_)));
}

#[test]
fn test_registry_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"TimeEntries": [{{"name": "id", "type": "STRING"}}], "Agents": [{{"name": "email", "type": "STRING"}}]}}"#
    )
    .unwrap();

    let registry = SchemaRegistry::from_file(file.path()).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Agents", "TimeEntries"]);
}

#[test]
fn test_registry_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SchemaRegistry::from_file(dir.path().join("schema.json")).unwrap();
    assert!(registry.is_empty());
    assert!(registry.get("TimeEntries").is_none());
}

#[test]
fn test_registry_from_str_trait() {
    let registry: SchemaRegistry = r#"{"A": [{"name": "x", "type": "DATE"}]}"#.parse().unwrap();
    assert!(registry.get("A").is_some());
}
