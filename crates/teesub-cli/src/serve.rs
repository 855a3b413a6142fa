//! HTTP front end: `GET /health` and `POST /analyze-dataset`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use teesub_core::DatasetRequest;
use teesub_runtime::{Pipeline, PipelineError, ResolveError};
use tracing::{error, info, warn};

use crate::CliError;

pub fn run(pipeline: Pipeline, addr: SocketAddr) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("tokio runtime: {e}")))?;

    // The narrator owns a blocking HTTP client, which must not be dropped on
    // an async worker: stop the runtime first, then release the pipeline.
    let pipeline = Arc::new(pipeline);
    let result = runtime.block_on(listen(Arc::clone(&pipeline), addr));
    drop(runtime);
    drop(pipeline);
    result
}

async fn listen(pipeline: Arc<Pipeline>, addr: SocketAddr) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Io(format!("bind {addr}: {e}")))?;
    info!(%addr, base = %pipeline.dataset_base().display(), "listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::Runtime(format!("server: {e}")))
}

fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze-dataset", post(analyze_dataset))
        .with_state(pipeline)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn analyze_dataset(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<DatasetRequest>,
) -> Response {
    let outcome = tokio::task::spawn_blocking(move || pipeline.analyze(&request)).await;
    match outcome {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(PipelineError::Rejected(err))) => {
            error_body(rejection_status(&err), err.to_string())
        }
        Ok(Err(err)) => {
            error!(error = %err, "analysis failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
        Err(err) => {
            error!(error = %err, "analysis task aborted");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

fn rejection_status(err: &ResolveError) -> StatusCode {
    match err {
        ResolveError::PathEscape { .. } => StatusCode::BAD_REQUEST,
        ResolveError::DatasetNotFound { .. } => StatusCode::NOT_FOUND,
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
