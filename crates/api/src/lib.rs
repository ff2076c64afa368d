//! `api` crate — HTTP REST layer over the flow engine.
//!
//! Routes:
//!   GET/POST   /api/v1/flows
//!   GET/PUT/DELETE /api/v1/flows/{id}
//!   GET/POST   /api/v1/flows/{id}/structure
//!   POST       /api/v1/flows/{id}/execute
//!   POST       /api/v1/flows/{id}/test
//!   GET        /api/v1/flow-executions/{id}
//!   GET        /api/v1/flow-executions/{id}/logs
//!   POST       /api/v1/flow-executions/{id}/pause
//!   POST       /api/v1/flow-executions/{id}/resume
//!   POST       /api/v1/webhook

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::{ExecutionLogStore, ExecutionStore, FlowEngine, FlowStore};

pub mod handlers;

use handlers::{executions, flows, webhooks};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FlowEngine>,
    pub flows: Arc<dyn FlowStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub logs: Arc<dyn ExecutionLogStore>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/flows", get(flows::list).post(flows::create))
        .route(
            "/api/v1/flows/:id",
            get(flows::get).put(flows::update).delete(flows::delete),
        )
        .route(
            "/api/v1/flows/:id/structure",
            get(flows::get_structure).post(flows::replace_structure),
        )
        .route("/api/v1/flows/:id/execute", post(executions::execute))
        .route("/api/v1/flows/:id/test", post(executions::test))
        .route("/api/v1/flow-executions/:id", get(executions::get))
        .route("/api/v1/flow-executions/:id/logs", get(executions::logs))
        .route("/api/v1/flow-executions/:id/pause", post(executions::pause))
        .route(
            "/api/v1/flow-executions/:id/resume",
            post(executions::resume),
        )
        .route("/api/v1/webhook", post(webhooks::inbound))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("API server listening on {bind}");
    axum::serve(listener, router(state)).await
}
