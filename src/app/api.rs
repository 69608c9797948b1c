use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::pipeline::ClusterService;
use crate::TARGET_WEB_REQUEST;

/// Builds the API router around a shared cluster service.
pub fn router(service: Arc<ClusterService>) -> Router {
    Router::new()
        .route("/api/news/clusters", get(get_clusters))
        .route("/health", get(health))
        .with_state(service)
}

/// Runs the API server until it fails.
pub async fn serve(service: Arc<ClusterService>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;

    info!(target: TARGET_WEB_REQUEST, "Server running on http://{}", addr);

    axum::serve(listener, router(service).into_make_service())
        .await
        .context("API server stopped")
}

/// Returns the current clusters, or a JSON error when none can be produced.
async fn get_clusters(State(service): State<Arc<ClusterService>>) -> Response {
    info!(target: TARGET_WEB_REQUEST, "Received request for /api/news/clusters");

    match service.current_clusters().await {
        Ok(clusters) => {
            info!(target: TARGET_WEB_REQUEST, "Returning {} clusters", clusters.len());
            Json(clusters.as_slice()).into_response()
        }
        Err(err) => {
            error!(target: TARGET_WEB_REQUEST, "Error fetching news data: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to process news data: {}", err) })),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
