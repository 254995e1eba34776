//! Master Node - HTTP API
//!
//! Reporters push records to `/in`; operators read the table from `/`.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Acknowledgement body for `/in`.
pub const ACK: &str = "OK";

/// Faults raised while composing a response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to render node table: {0}")]
    Render(#[from] std::fmt::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub nodes: usize,
    pub views: u64,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(render_table))
        .route("/in", post(receive_record))
        .route("/ver", get(version_info))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn render_table(State(state): State<AppState>) -> Result<String, AppError> {
    Ok(state.nodes.render().await?)
}

async fn receive_record(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> &'static str {
    let record = match body {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        Ok(_) => "Read request error: empty body".to_string(),
        Err(e) => {
            warn!(error = %e, "Failed to read record body");
            format!("Read request error: {}", e)
        }
    };

    let node = state.nodes.ingest(record).await;
    debug!(node = %node, "Record received");

    ACK
}

async fn version_info(State(state): State<AppState>) -> String {
    format!(
        "view: {}\nversion: {}\n{}\n",
        state.nodes.views(),
        crate::version::full(),
        state.identity
    )
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        nodes: state.nodes.len().await,
        views: state.nodes.views(),
    })
}
