//! Flow CRUD and structure handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use engine::models::{EdgeSpec, FlowSpec, NodeSpec};
use engine::{Flow, FlowStatus};
use nodes::Context;

use super::store_status;
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct CreateFlowDto {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_conditions: Context,
    #[serde(default)]
    pub metadata: Context,
}

#[derive(serde::Deserialize)]
pub struct UpdateFlowDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<FlowStatus>,
    pub trigger_conditions: Option<Context>,
    pub metadata: Option<Context>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct StructureDto {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Flow>>, StatusCode> {
    match state.flows.list_flows().await {
        Ok(flows) => Ok(Json(flows)),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Flow>, StatusCode> {
    match state.flows.get_flow(id).await {
        Ok(flow) => Ok(Json(flow)),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateFlowDto>,
) -> Result<(StatusCode, Json<Flow>), StatusCode> {
    let mut flow = Flow::new(payload.name);
    flow.description = payload.description;
    flow.trigger_conditions = payload.trigger_conditions;
    flow.metadata = payload.metadata;

    match state.flows.create_flow(flow).await {
        Ok(flow) => Ok((StatusCode::CREATED, Json(flow))),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateFlowDto>,
) -> Result<Json<Flow>, StatusCode> {
    let mut flow = match state.flows.get_flow(id).await {
        Ok(flow) => flow,
        Err(e) => return Err(store_status(&e)),
    };

    if let Some(name) = payload.name {
        flow.name = name;
    }
    if let Some(description) = payload.description {
        flow.description = Some(description);
    }
    if let Some(status) = payload.status {
        flow.status = status;
    }
    if let Some(trigger_conditions) = payload.trigger_conditions {
        flow.trigger_conditions = trigger_conditions;
    }
    if let Some(metadata) = payload.metadata {
        flow.metadata = metadata;
    }

    match state.flows.update_flow(flow).await {
        Ok(flow) => Ok(Json(flow)),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, StatusCode> {
    match state.flows.delete_flow(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(store_status(&e)),
    }
}

pub async fn get_structure(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<StructureDto>, StatusCode> {
    // 404 for a missing flow rather than an empty structure.
    if let Err(e) = state.flows.get_flow(id).await {
        return Err(store_status(&e));
    }

    let nodes = match state.flows.get_nodes(id).await {
        Ok(nodes) => nodes,
        Err(e) => return Err(store_status(&e)),
    };
    let edges = match state.flows.get_edges(id).await {
        Ok(edges) => edges,
        Err(e) => return Err(store_status(&e)),
    };

    let nodes = nodes
        .into_iter()
        .map(|node| {
            let (kind, data) = node.kind.to_parts();
            NodeSpec {
                id: node.node_id,
                kind,
                position: node.position,
                data,
            }
        })
        .collect();
    let edges = edges
        .into_iter()
        .map(|edge| EdgeSpec {
            id: edge.edge_id,
            source: edge.source,
            target: edge.target,
            source_handle: edge.source_handle,
            target_handle: edge.target_handle,
            data: edge.data,
        })
        .collect();

    Ok(Json(StructureDto { nodes, edges }))
}

/// Replace-all save: the incoming batch atomically supersedes every stored
/// node and edge of the flow.
pub async fn replace_structure(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<StructureDto>,
) -> Result<Json<Value>, StatusCode> {
    let spec = FlowSpec {
        name: String::new(),
        trigger_conditions: Context::new(),
        nodes: payload.nodes,
        edges: payload.edges,
    };
    let (_, nodes, edges) = match spec.into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            tracing::warn!(flow_id = %id, error = %e, "rejected structure save");
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    };

    match state.flows.replace_structure(id, nodes, edges).await {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => Err(store_status(&e)),
    }
}
