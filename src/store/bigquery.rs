//! BigQuery v2 REST implementation of `TableStore`

use super::types::{
    InsertBatch, JobHandle, JobState, JobStatus, LoadJobSpec, TableInfo, TableRef, TableSpec,
    TimePartitioning,
};
use super::TableStore;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::schema::TableSchema;
use crate::types::JsonValue;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Public BigQuery API root
pub const BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";

const MULTIPART_BOUNDARY: &str = "freshdesk_bq_load_job_boundary";

/// Table store backed by the BigQuery REST API
pub struct BigQueryStore {
    client: HttpClient,
}

impl BigQueryStore {
    /// Create a store on an authenticated client
    ///
    /// The client's base URL is the API root, normally `BIGQUERY_ENDPOINT`.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn tables_path(project: &str, dataset: &str) -> String {
        format!("/bigquery/v2/projects/{project}/datasets/{dataset}/tables")
    }

    fn table_path(table: &TableRef) -> String {
        format!(
            "{}/{}",
            Self::tables_path(&table.project, &table.dataset),
            table.table
        )
    }
}

#[async_trait]
impl TableStore for BigQueryStore {
    async fn get_table(&self, table: &TableRef) -> Result<Option<TableInfo>> {
        let result: Result<TableResource> = self
            .client
            .get_json(&Self::table_path(table), RequestConfig::new())
            .await;

        match result {
            Ok(resource) => Ok(Some(resource.into_info(table.clone()))),
            Err(e) if e.is_not_found() => {
                debug!("Table {} does not exist", table);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo> {
        let mut body = json!({ "tableReference": table_reference(&spec.table) });
        body["schema"] = serde_json::to_value(&spec.schema)?;
        if let Some(partitioning) = &spec.time_partitioning {
            body["timePartitioning"] = serde_json::to_value(partitioning)?;
        }

        let resource: TableResource = self
            .client
            .send_json(
                Method::POST,
                &Self::tables_path(&spec.table.project, &spec.table.dataset),
                RequestConfig::new().json(body),
            )
            .await?;

        info!("Created table {}", spec.table);
        Ok(resource.into_info(spec.table.clone()))
    }

    async fn insert_rows(&self, table: &TableRef, batch: &InsertBatch<'_>) -> Result<()> {
        let rows: Vec<JsonValue> = batch
            .entries()
            .map(|(insert_id, row)| json!({ "insertId": insert_id, "json": row }))
            .collect();
        let body = json!({
            "skipInvalidRows": false,
            "ignoreUnknownValues": false,
            "rows": rows,
        });

        let response: InsertAllResponse = self
            .client
            .send_json(
                Method::POST,
                &format!("{}/insertAll", Self::table_path(table)),
                RequestConfig::new().json(body).retries(0),
            )
            .await
            .map_err(|e| match e {
                Error::HttpStatus { status, body } => {
                    Error::insert(table.to_string(), format!("HTTP {status}: {body}"))
                }
                other => other,
            })?;

        if let Some(first) = response.insert_errors.first() {
            let reasons: Vec<String> = first
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.reason, e.message))
                .collect();
            return Err(Error::insert(
                table.to_string(),
                format!(
                    "{} rows rejected, first at index {}: {}",
                    response.insert_errors.len(),
                    first.index,
                    reasons.join("; ")
                ),
            ));
        }

        debug!(
            "Inserted {} rows into {} (batch {})",
            batch.len(),
            table,
            batch.batch_id()
        );
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<bool> {
        match self.client.delete(&Self::table_path(table)).await {
            Ok(_) => {
                info!("Deleted table {}", table);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!("Table {} already absent", table);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_load_job(&self, job: &LoadJobSpec, rows: &[JsonValue]) -> Result<JobHandle> {
        let mut load = json!({
            "destinationTable": table_reference(&job.destination),
            "sourceFormat": "NEWLINE_DELIMITED_JSON",
            "writeDisposition": job.write_disposition.as_str(),
            "createDisposition": job.create_disposition.as_str(),
        });
        match &job.schema {
            Some(schema) => load["schema"] = serde_json::to_value(schema)?,
            None => load["autodetect"] = JsonValue::Bool(true),
        }
        let metadata = json!({ "configuration": { "load": load } });

        let body = multipart_body(&metadata, &ndjson(rows)?)?;
        let path = format!(
            "/upload/bigquery/v2/projects/{}/jobs",
            job.destination.project
        );

        let resource: JobResource = self
            .client
            .send_json(
                Method::POST,
                &path,
                RequestConfig::new()
                    .query("uploadType", "multipart")
                    .raw(
                        format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                        body,
                    ),
            )
            .await?;

        let handle = JobHandle {
            project: resource.job_reference.project_id,
            job_id: resource.job_reference.job_id,
            location: resource.job_reference.location,
        };
        info!(
            "Submitted load job {} for {} ({} rows)",
            handle.job_id,
            job.destination,
            rows.len()
        );
        Ok(handle)
    }

    async fn get_job(&self, job: &JobHandle) -> Result<JobStatus> {
        let mut config = RequestConfig::new();
        if let Some(location) = &job.location {
            config = config.query("location", location);
        }

        let resource: JobResource = self
            .client
            .get_json(
                &format!("/bigquery/v2/projects/{}/jobs/{}", job.project, job.job_id),
                config,
            )
            .await?;

        let status = resource
            .status
            .ok_or_else(|| Error::store(format!("Job {} has no status", job.job_id)))?;

        Ok(JobStatus {
            state: status.state.parse()?,
            error: status.error_result.map(|e| match e.reason {
                Some(reason) => format!("{reason}: {}", e.message),
                None => e.message,
            }),
        })
    }
}

impl std::fmt::Debug for BigQueryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryStore")
            .field("client", &self.client)
            .finish()
    }
}

fn table_reference(table: &TableRef) -> JsonValue {
    json!({
        "projectId": table.project,
        "datasetId": table.dataset,
        "tableId": table.table,
    })
}

/// Rows as newline-delimited JSON
fn ndjson(rows: &[JsonValue]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// `multipart/related` body with job metadata followed by the data
fn multipart_body(metadata: &JsonValue, data: &str) -> Result<String> {
    let metadata = serde_json::to_string(metadata)?;
    Ok(format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
         --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    time_partitioning: Option<TimePartitioning>,
    #[serde(default)]
    num_rows: Option<String>,
}

impl TableResource {
    fn into_info(self, table: TableRef) -> TableInfo {
        TableInfo {
            table,
            schema: self.schema,
            time_partitioning: self.time_partitioning,
            num_rows: self.num_rows.and_then(|n| n.parse().ok()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct InsertErrorEntry {
    #[serde(default)]
    index: u64,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatusResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResource {
    state: String,
    #[serde(default)]
    error_result: Option<JobError>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: String,
}
