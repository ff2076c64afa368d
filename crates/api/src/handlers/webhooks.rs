//! Inbound-message webhook: matches trigger conditions and starts flows.
//!
//! The body is the simplified inbound contract; parsing the provider's
//! envelope (and audio transcription, voice replies, …) happens upstream of
//! this endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use engine::trigger;
use nodes::Context;

use super::{engine_status, store_status};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct InboundMessageDto {
    pub whatsapp_number_id: String,
    pub from: String,
    pub message: String,
}

pub async fn inbound(
    State(state): State<AppState>,
    Json(payload): Json<InboundMessageDto>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let flows = match state.flows.list_flows().await {
        Ok(flows) => flows,
        Err(e) => return Err(store_status(&e)),
    };

    let Some(flow) = trigger::first_match(&flows, &payload.message) else {
        return Ok((StatusCode::OK, Json(json!({ "matched": false }))));
    };

    let mut initial_context = Context::new();
    initial_context.insert("message".into(), json!(payload.message));
    initial_context.insert("contact".into(), json!(payload.from));

    let (graph, execution) = match state
        .engine
        .initiate(
            flow.id,
            &payload.whatsapp_number_id,
            &payload.from,
            initial_context,
        )
        .await
    {
        Ok(pair) => pair,
        Err(e) => return Err(engine_status(&e)),
    };

    let response = json!({
        "matched": true,
        "flow_id": flow.id,
        "execution_id": execution.id,
        "status": execution.status.to_string(),
    });

    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.run(&graph, execution, None).await {
            tracing::error!(error = %e, "triggered flow execution failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}
