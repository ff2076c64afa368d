//! Execution handlers: start, test, inspect, pause/resume.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use engine::{ExecutionLog, FlowExecution};
use nodes::Context;

use super::{engine_status, store_status};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct ExecuteFlowDto {
    pub whatsapp_number_id: String,
    pub contact_number: String,
    #[serde(default)]
    pub initial_context: Context,
}

#[derive(serde::Deserialize)]
pub struct TestFlowDto {
    pub input_message: String,
    pub contact_number: String,
    #[serde(default)]
    pub context: Context,
}

#[derive(serde::Serialize)]
pub struct ExecutionResponse {
    pub execution_id: Uuid,
    pub status: String,
    pub current_node: Option<String>,
}

impl From<&FlowExecution> for ExecutionResponse {
    fn from(execution: &FlowExecution) -> Self {
        Self {
            execution_id: execution.id,
            status: execution.status.to_string(),
            current_node: execution.current_node_id.clone(),
        }
    }
}

/// Start an execution. The response reflects only that the start succeeded;
/// the traversal continues in a background task and the caller polls the
/// execution for its terminal status.
pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteFlowDto>,
) -> Result<(StatusCode, Json<ExecutionResponse>), StatusCode> {
    let (graph, execution) = match state
        .engine
        .initiate(
            id,
            &payload.whatsapp_number_id,
            &payload.contact_number,
            payload.initial_context,
        )
        .await
    {
        Ok(pair) => pair,
        Err(e) => return Err(engine_status(&e)),
    };

    let response = ExecutionResponse::from(&execution);
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.run(&graph, execution, None).await {
            tracing::error!(error = %e, "flow execution failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Dry run with mock adapters; fully synchronous.
pub async fn test(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<TestFlowDto>,
) -> Result<Json<ExecutionResponse>, StatusCode> {
    match state
        .engine
        .test_execution(
            id,
            &payload.input_message,
            &payload.contact_number,
            payload.context,
        )
        .await
    {
        Ok(result) => Ok(Json(ExecutionResponse::from(&result.execution))),
        Err(e) => Err(engine_status(&e)),
    }
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<FlowExecution>, StatusCode> {
    match state.executions.get(id).await {
        Ok(execution) => Ok(Json(execution)),
        Err(e) => Err(store_status(&e)),
    }
}

/// The ordered audit trail of one execution.
pub async fn logs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExecutionLog>>, StatusCode> {
    // Distinguish "no such execution" from "no steps yet".
    if let Err(e) = state.executions.get(id).await {
        return Err(store_status(&e));
    }
    match state.logs.list(id).await {
        Ok(logs) => Ok(Json(logs)),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn pause(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionResponse>, StatusCode> {
    match state.engine.pause_execution(id).await {
        Ok(execution) => Ok(Json(ExecutionResponse::from(&execution))),
        Err(e) => Err(engine_status(&e)),
    }
}

pub async fn resume(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionResponse>, StatusCode> {
    match state.engine.resume_execution(id).await {
        Ok(execution) => Ok(Json(ExecutionResponse::from(&execution))),
        Err(e) => Err(engine_status(&e)),
    }
}
