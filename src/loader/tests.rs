//! Tests for the loaders

use super::*;
use crate::schema::{time_entries_schema, FieldType, SchemaField, TableSchema};
use crate::store::{
    CreateDisposition, MemoryStore, StoreCall, TableSpec, TimePartitioning, WriteDisposition,
};
use crate::types::BackoffType;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use test_case::test_case;

fn table() -> TableRef {
    TableRef::new("proj", "ds", "freshdesk_time_entries_202402")
}

fn records(n: usize) -> Vec<JsonValue> {
    (0..n)
        .map(|i| json!({"id": i.to_string(), "billable": true, "time_spent_in_seconds": 60}))
        .collect()
}

fn streaming(store: &Arc<MemoryStore>, config: LoaderConfig) -> Box<dyn Loader> {
    LoaderKind::InsertRows.build(store.clone(), Arc::new(SchemaRegistry::new()), config)
}

fn load_job(store: &Arc<MemoryStore>, registry: SchemaRegistry) -> Box<dyn Loader> {
    LoaderKind::InsertJson.build(store.clone(), Arc::new(registry), LoaderConfig::immediate())
}

// ============================================================================
// Registry and policy
// ============================================================================

#[test_case("InsertRows", LoaderKind::InsertRows)]
#[test_case("InsertJson", LoaderKind::InsertJson)]
fn test_loader_kind_parse(name: &str, expected: LoaderKind) {
    let kind: LoaderKind = name.parse().unwrap();
    assert_eq!(kind, expected);
    assert_eq!(kind.name(), name);
}

#[test]
fn test_loader_kind_unknown() {
    let err = "InsertCsv".parse::<LoaderKind>().unwrap_err();
    assert!(err.to_string().contains("InsertCsv"));
}

#[test]
fn test_retry_policy_defaults() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 100);
    assert_eq!(policy.backoff, BackoffType::Exponential);
    assert_eq!(policy.delay_after(1), Duration::from_secs(1));
    assert_eq!(policy.delay_after(2), Duration::from_secs(2));
    assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    assert_eq!(policy.delay_after(4), Duration::from_secs(5));
    assert_eq!(policy.delay_after(50), Duration::from_secs(5));
}

#[test]
fn test_retry_policy_budget() {
    let policy = RetryPolicy::default();
    assert!(policy.allows_retry(1, Duration::ZERO));
    assert!(!policy.allows_retry(100, Duration::ZERO));
    assert!(!policy.allows_retry(10, Duration::from_secs(598)));

    let unbounded = RetryPolicy::immediate(3);
    assert!(unbounded.allows_retry(2, Duration::from_secs(100_000)));
    assert!(!unbounded.allows_retry(3, Duration::ZERO));
}

#[test]
fn test_load_phase_transitions() {
    use LoadPhase::*;

    assert!(Start.can_transition_to(SchemaFound));
    assert!(Start.can_transition_to(Autodetect));
    assert!(Autodetect.can_transition_to(Submitted));
    assert!(Submitted.can_transition_to(Waiting));
    assert!(Waiting.can_transition_to(Waiting));
    assert!(Waiting.can_transition_to(Success));
    assert!(Submitted.can_transition_to(Failure));

    assert!(!Start.can_transition_to(Submitted));
    assert!(!Success.can_transition_to(Waiting));
    assert!(!Failure.can_transition_to(Submitted));
    assert!(Success.is_terminal());
    assert!(!Waiting.is_terminal());
}

#[test]
fn test_outcome_rows() {
    assert_eq!(LoadOutcome::Skipped.rows(), 0);
    assert_eq!(LoadOutcome::Appended { rows: 3 }.rows(), 3);
}

// ============================================================================
// Streaming inserts
// ============================================================================

#[tokio::test]
async fn test_streaming_empty_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let loader = streaming(&store, LoaderConfig::immediate());

    let options = LoadOptions {
        replace_existing: true,
        ..Default::default()
    };
    let outcome = loader.load(&[], &table(), &options).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Skipped);
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn test_streaming_appends_to_existing_table() {
    let store = Arc::new(MemoryStore::new());
    store
        .seed_table(
            TableSpec {
                table: table(),
                schema: time_entries_schema(),
                time_partitioning: Some(TimePartitioning::day()),
            },
            records(2),
        )
        .await;

    let loader = streaming(&store, LoaderConfig::immediate());
    let outcome = loader
        .load(&records(3), &table(), &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, LoadOutcome::Appended { rows: 3 });
    assert_eq!(store.rows(&table()).await.len(), 5);
    assert_eq!(
        store.calls().await,
        vec![
            StoreCall::GetTable(table().to_string()),
            StoreCall::InsertRows {
                table: table().to_string(),
                rows: 3
            },
        ]
    );
}

#[tokio::test]
async fn test_streaming_creates_missing_table() {
    let store = Arc::new(MemoryStore::new().with_insert_lag(2));
    let loader = streaming(&store, LoaderConfig::immediate());

    let outcome = loader
        .load(&records(4), &table(), &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::CreatedAndInserted {
            rows: 4,
            attempts: 3
        }
    );

    let created = store.table(&table()).await.unwrap();
    assert_eq!(created.schema, Some(time_entries_schema()));
    assert_eq!(created.time_partitioning, Some(TimePartitioning::day()));
    assert_eq!(created.rows, records(4));
}

#[tokio::test]
async fn test_streaming_retries_resend_same_batch() {
    let store = Arc::new(MemoryStore::new().with_insert_lag(2));
    let loader = streaming(&store, LoaderConfig::immediate());

    loader
        .load(&records(4), &table(), &LoadOptions::default())
        .await
        .unwrap();

    let batch_ids = store.insert_batch_ids().await;
    assert_eq!(batch_ids.len(), 3);
    assert!(!batch_ids[0].is_empty());
    assert!(batch_ids.iter().all(|id| *id == batch_ids[0]));
}

#[tokio::test]
async fn test_streaming_lost_ack_does_not_duplicate() {
    let store = Arc::new(MemoryStore::new().with_lost_acks(1));
    let loader = streaming(&store, LoaderConfig::immediate());

    let outcome = loader
        .load(&records(3), &table(), &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::CreatedAndInserted {
            rows: 3,
            attempts: 2
        }
    );
    assert_eq!(store.rows(&table()).await, records(3));
}

#[tokio::test]
async fn test_streaming_loads_use_fresh_batches() {
    let store = Arc::new(MemoryStore::new());
    let loader = streaming(&store, LoaderConfig::immediate());

    loader
        .load(&records(2), &table(), &LoadOptions::default())
        .await
        .unwrap();
    loader
        .load(&records(2), &table(), &LoadOptions::default())
        .await
        .unwrap();

    let batch_ids = store.insert_batch_ids().await;
    assert_eq!(batch_ids.len(), 2);
    assert_ne!(batch_ids[0], batch_ids[1]);
    assert_eq!(store.rows(&table()).await.len(), 4);
}

#[tokio::test]
async fn test_streaming_retries_exhausted_leaves_table() {
    let store = Arc::new(MemoryStore::new().with_insert_lag(u32::MAX));
    let mut config = LoaderConfig::immediate();
    config.retry = RetryPolicy::immediate(4);
    let loader = streaming(&store, config);

    let err = loader
        .load(&records(1), &table(), &LoadOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::InsertRetriesExhausted {
            table: name,
            attempts,
            last_error,
        } => {
            assert_eq!(name, table().to_string());
            assert_eq!(attempts, 4);
            assert!(last_error.contains("Not found"));
        }
        other => panic!("Expected InsertRetriesExhausted, got {other:?}"),
    }

    let left = store.table(&table()).await.unwrap();
    assert!(left.rows.is_empty());
}

#[tokio::test]
async fn test_streaming_replace_deletes_first() {
    let store = Arc::new(MemoryStore::new());
    store
        .seed_table(
            TableSpec {
                table: table(),
                schema: time_entries_schema(),
                time_partitioning: None,
            },
            records(10),
        )
        .await;

    let loader = streaming(&store, LoaderConfig::immediate());
    let options = LoadOptions {
        replace_existing: true,
        ..Default::default()
    };
    let outcome = loader.load(&records(2), &table(), &options).await.unwrap();

    assert!(matches!(outcome, LoadOutcome::CreatedAndInserted { rows: 2, .. }));
    assert_eq!(store.rows(&table()).await, records(2));

    let calls = store.calls().await;
    assert_eq!(calls[0], StoreCall::DeleteTable(table().to_string()));
    assert_eq!(calls[1], StoreCall::GetTable(table().to_string()));
    assert_eq!(calls[2], StoreCall::CreateTable(table().to_string()));
}

#[tokio::test]
async fn test_streaming_replace_missing_table_is_fine() {
    let store = Arc::new(MemoryStore::new());
    let loader = streaming(&store, LoaderConfig::immediate());
    let options = LoadOptions {
        replace_existing: true,
        ..Default::default()
    };

    loader.load(&records(1), &table(), &options).await.unwrap();
    assert_eq!(store.rows(&table()).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_streaming_replace_pauses() {
    let store = Arc::new(MemoryStore::new());
    let mut config = LoaderConfig::immediate();
    config.replace_pause = Duration::from_secs(15);
    let loader = streaming(&store, config);

    let options = LoadOptions {
        replace_existing: true,
        ..Default::default()
    };
    let start = tokio::time::Instant::now();
    loader.load(&records(1), &table(), &options).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(15));
}

// ============================================================================
// Load jobs
// ============================================================================

#[tokio::test]
async fn test_load_job_empty_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let loader = load_job(&store, SchemaRegistry::new());

    let outcome = loader
        .load(&[], &table(), &LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Skipped);
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn test_load_job_autodetect_without_schema() {
    let store = Arc::new(MemoryStore::new().with_job_polls(2));
    let loader = load_job(&store, SchemaRegistry::new());

    let options = LoadOptions {
        schema_name: Some("TimeEntries".to_string()),
        ..Default::default()
    };
    let outcome = loader.load(&records(3), &table(), &options).await.unwrap();

    match outcome {
        LoadOutcome::JobCompleted {
            rows, autodetect, ..
        } => {
            assert_eq!(rows, 3);
            assert!(autodetect);
        }
        other => panic!("Expected JobCompleted, got {other:?}"),
    }

    let polls = store
        .calls()
        .await
        .into_iter()
        .filter(|c| matches!(c, StoreCall::GetJob(_)))
        .count();
    assert_eq!(polls, 3);
    assert_eq!(store.table(&table()).await.unwrap().schema, None);
}

#[tokio::test]
async fn test_load_job_uses_declared_schema() {
    let schema = TableSchema::new(vec![SchemaField::nullable("id", FieldType::String)]);
    let mut registry = SchemaRegistry::new();
    registry.insert("TimeEntries", schema.clone());

    let store = Arc::new(MemoryStore::new());
    let loader = load_job(&store, registry);

    let options = LoadOptions {
        schema_name: Some("TimeEntries".to_string()),
        write_disposition: WriteDisposition::WriteTruncate,
        ..Default::default()
    };
    let outcome = loader.load(&records(2), &table(), &options).await.unwrap();

    assert!(matches!(
        outcome,
        LoadOutcome::JobCompleted {
            autodetect: false,
            ..
        }
    ));
    assert_eq!(store.table(&table()).await.unwrap().schema, Some(schema));
}

#[tokio::test]
async fn test_load_job_failure_reported_once() {
    let store = Arc::new(MemoryStore::new().with_failing_jobs("invalid: bad row"));
    let loader = load_job(&store, SchemaRegistry::new());

    let err = loader
        .load(&records(1), &table(), &LoadOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::LoadJob { job_id, message } => {
            assert_eq!(job_id, "job_1");
            assert_eq!(message, "invalid: bad row");
        }
        other => panic!("Expected LoadJob error, got {other:?}"),
    }

    let submits = store
        .calls()
        .await
        .into_iter()
        .filter(|c| matches!(c, StoreCall::SubmitLoadJob { .. }))
        .count();
    assert_eq!(submits, 1);
}

#[tokio::test]
async fn test_load_job_create_never_on_missing_table() {
    let store = Arc::new(MemoryStore::new());
    let loader = load_job(&store, SchemaRegistry::new());

    let options = LoadOptions {
        create_disposition: CreateDisposition::CreateNever,
        ..Default::default()
    };
    let err = loader
        .load(&records(1), &table(), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LoadJob { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_load_job_timeout() {
    let store = Arc::new(MemoryStore::new().with_job_polls(u32::MAX));
    let config = LoaderConfig {
        poll_interval: Duration::from_secs(1),
        job_timeout: Duration::from_secs(5),
        ..LoaderConfig::immediate()
    };
    let loader = LoaderKind::InsertJson.build(store.clone(), Arc::new(SchemaRegistry::new()), config);

    let err = loader
        .load(&records(1), &table(), &LoadOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not finished"));
}
