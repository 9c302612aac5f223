//! HTTP trigger server
//!
//! `POST /` runs one pipeline request and answers `Success` or the error
//! text with status 400. Runs are serialized, so one process handles one job
//! at a time.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::{Pipeline, RunRequest};
use crate::error::{Error, Result};

/// Body of a successful trigger
pub const SUCCESS_BODY: &str = "Success";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

/// App state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    running: Arc<Mutex<()>>,
}

/// Build the router
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let state = AppState {
        pipeline,
        running: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/", post(trigger).options(preflight))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(pipeline: Pipeline, config: ServerConfig) -> Result<()> {
    let app = router(Arc::new(pipeline));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::invalid_value("server.host", format!("{e}")))?;
    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// CORS preflight
async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, "3600"),
        ],
    )
}

/// Run one pipeline request
async fn trigger(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: RunRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Rejected trigger body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {e}"),
            );
        }
    };

    let _guard = state.running.lock().await;
    match state.pipeline.run(&request).await {
        Ok(report) => {
            info!(
                "Loaded {} records into {} ({:?})",
                report.records, report.table, report.outcome
            );
            (StatusCode::OK, SUCCESS_BODY.to_string())
        }
        Err(e) => {
            error!("Pipeline run failed: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}
