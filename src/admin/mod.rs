//! Status HTTP endpoints for one node
//!
//! Read-only view of the node's cluster state:
//!
//! | Route | Returns |
//! |---|---|
//! | `GET /health` | liveness, version, uptime |
//! | `GET /api/nodes` | membership snapshot |
//! | `GET /api/shards/{id}/next` | next balanced node for a shard |
//! | `GET /api/processlog` | recent indexing process log |
//! | `GET /metrics` | Prometheus text format |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cluster::{ClusterContext, NodeSnapshot};
use crate::processlog::ProcessLog;

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ClusterContext>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(context: Arc<ClusterContext>) -> Self {
        Self {
            context,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub node_id: String,
    pub is_master: bool,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub master: String,
    pub active: usize,
    pub nodes: Vec<NodeSnapshot>,
}

// ============================================================================
// API Routes
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/nodes", get(list_nodes))
        .route("/api/shards/{id}/next", get(next_shard_node))
        .route("/api/processlog", get(process_log))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    context: Arc<ClusterContext>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, node_id = %context.environment.my_node_id, "Admin server listening");

    axum::serve(listener, create_router(AppState::new(context)))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Admin server stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let registry = &state.context.registry;

    Json(ApiResponse::success(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        node_id: registry.my_node_id().to_string(),
        is_master: registry.is_master().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

async fn list_nodes(State(state): State<AppState>) -> impl IntoResponse {
    let registry = &state.context.registry;

    Json(ApiResponse::success(NodesResponse {
        master: registry.master_node().await.id.clone(),
        active: registry.active_count().await,
        nodes: registry.snapshot().await,
    }))
}

async fn next_shard_node(
    State(state): State<AppState>,
    Path(shard_id): Path<String>,
) -> Response {
    match state.context.registry.get_balanced_node(&shard_id) {
        Some(node) => (StatusCode::OK, Json(ApiResponse::success(node.snapshot()))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<NodeSnapshot>::failure(format!(
                "no candidate node for shard [{shard_id}]"
            ))),
        )
            .into_response(),
    }
}

async fn process_log(State(state): State<AppState>) -> Json<ApiResponse<Vec<ProcessLog>>> {
    Json(ApiResponse::success(state.context.process_log.entries().await))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.context.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::failure(e.to_string())),
        )
            .into_response(),
    }
}
