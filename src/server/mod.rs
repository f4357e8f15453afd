//! HTTP API over the search pipelines
//!
//! Every route answers with the same envelope:
//! `{"success": bool, "data": ..., "error": "..."}`. Failures are reported
//! with status 500 regardless of cause.

use crate::config::ServerConfig;
use crate::error::{DeepSearchError, Result};
use crate::retrieval::{DeepSearchOrchestrator, ResultSet};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Result count used when a request omits `limit`
pub const DEFAULT_LIMIT: usize = 10;

/// Response envelope shared by all routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Body of `POST /api/search` and `POST /api/deep_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequestBody {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<DeepSearchOrchestrator>,
    default_limit: usize,
}

impl AppState {
    pub fn new(orchestrator: DeepSearchOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Result count for requests without `limit`
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Search,
    DeepSearch,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/deep_search", post(deep_search_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> Json<ApiResponse> {
    Json(ApiResponse::success_with_data(
        serde_json::json!({ "status": "ok" }),
    ))
}

async fn search_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<SearchRequestBody>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    handle(state, body, Route::Search).await
}

async fn deep_search_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<SearchRequestBody>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    handle(state, body, Route::DeepSearch).await
}

async fn handle(
    state: AppState,
    body: std::result::Result<Json<SearchRequestBody>, JsonRejection>,
    route: Route,
) -> (StatusCode, Json<ApiResponse>) {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, ?route);

    async move {
        let Json(request) = match body {
            Ok(body) => body,
            Err(rejection) => {
                tracing::warn!(error = %rejection, "Rejected request body");
                return failure(rejection.body_text());
            }
        };

        let limit = request.limit.unwrap_or(state.default_limit);
        let outcome = match route {
            Route::Search => state.orchestrator.search(&request.query, limit).await,
            Route::DeepSearch => state.orchestrator.deep_search(&request.query, limit).await,
        };

        match outcome.and_then(results_to_json) {
            Ok(data) => (StatusCode::OK, Json(ApiResponse::success_with_data(data))),
            Err(e) => {
                tracing::error!(error = %e, query = %request.query, "Request failed");
                failure(e.to_string())
            }
        }
    }
    .instrument(span)
    .await
}

fn failure(message: String) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(message)),
    )
}

fn results_to_json(results: ResultSet) -> Result<serde_json::Value> {
    serde_json::to_value(results.into_inner()).map_err(|e| DeepSearchError::Json {
        source: e,
        context: "Failed to serialize search results".to_string(),
    })
}

/// Bind and serve until Ctrl-C
pub async fn serve(
    config: &ServerConfig,
    default_limit: usize,
    orchestrator: DeepSearchOrchestrator,
) -> Result<()> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeepSearchError::Io {
            source: e,
            context: format!("Failed to bind HTTP listener to {}", addr),
        })?;

    tracing::info!("Search API listening on {}", addr);

    let state = AppState::new(orchestrator).with_default_limit(default_limit);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DeepSearchError::Io {
            source: e,
            context: "HTTP server terminated".to_string(),
        })?;

    tracing::info!("Search API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
