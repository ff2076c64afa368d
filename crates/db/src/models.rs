//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour. Domain
//! types live in the `engine` crate; conversions between the two sit here so
//! repositories stay pure SQL.

use chrono::{DateTime, Utc};
use engine::models::Position;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use engine::{
    ExecutionLog, ExecutionStatus, Flow, FlowEdge, FlowExecution, FlowNode, FlowStatus, LogStatus,
};
use nodes::{Context, NodeKind};

use crate::DbError;

fn object(value: Value, what: &str) -> Result<Context, DbError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Context::new()),
        other => Err(DbError::Corrupt(format!("{what} is not an object: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// flows
// ---------------------------------------------------------------------------

/// A persisted flow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub trigger_conditions: Value,
    pub metadata: Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FlowRow> for Flow {
    type Error = DbError;

    fn try_from(row: FlowRow) -> Result<Self, Self::Error> {
        Ok(Flow {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row
                .status
                .parse::<FlowStatus>()
                .map_err(DbError::Corrupt)?,
            trigger_conditions: object(row.trigger_conditions, "trigger_conditions")?,
            metadata: object(row.metadata, "metadata")?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// flow_nodes
// ---------------------------------------------------------------------------

/// A persisted graph vertex.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowNodeRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub node_id: String,
    #[sqlx(rename = "type")]
    pub node_type: String,
    pub position: Value,
    pub data: Value,
}

impl TryFrom<FlowNodeRow> for FlowNode {
    type Error = DbError;

    fn try_from(row: FlowNodeRow) -> Result<Self, Self::Error> {
        let kind = NodeKind::from_parts(&row.node_type, row.data)
            .map_err(|e| DbError::Corrupt(format!("node '{}': {e}", row.node_id)))?;
        let position: Position = serde_json::from_value(row.position).unwrap_or_default();
        Ok(FlowNode {
            node_id: row.node_id,
            kind,
            position,
        })
    }
}

// ---------------------------------------------------------------------------
// flow_edges
// ---------------------------------------------------------------------------

/// A persisted graph edge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowEdgeRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub edge_id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub data: Value,
}

impl From<FlowEdgeRow> for FlowEdge {
    fn from(row: FlowEdgeRow) -> Self {
        FlowEdge {
            edge_id: row.edge_id,
            source: row.source,
            target: row.target,
            source_handle: row.source_handle,
            target_handle: row.target_handle,
            data: row.data,
        }
    }
}

// ---------------------------------------------------------------------------
// flow_executions
// ---------------------------------------------------------------------------

/// A persisted flow execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowExecutionRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub whatsapp_number_id: String,
    pub contact_number: String,
    pub status: String,
    pub current_node_id: Option<String>,
    pub context: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FlowExecutionRow> for FlowExecution {
    type Error = DbError;

    fn try_from(row: FlowExecutionRow) -> Result<Self, Self::Error> {
        Ok(FlowExecution {
            id: row.id,
            flow_id: row.flow_id,
            whatsapp_number_id: row.whatsapp_number_id,
            contact_number: row.contact_number,
            status: row
                .status
                .parse::<ExecutionStatus>()
                .map_err(DbError::Corrupt)?,
            current_node_id: row.current_node_id,
            context: object(row.context, "context")?,
            metadata: object(row.metadata, "metadata")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// flow_execution_logs
// ---------------------------------------------------------------------------

/// A persisted execution log row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlowExecutionLogRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub action: String,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<FlowExecutionLogRow> for ExecutionLog {
    type Error = DbError;

    fn try_from(row: FlowExecutionLogRow) -> Result<Self, Self::Error> {
        Ok(ExecutionLog {
            id: row.id,
            execution_id: row.execution_id,
            node_id: row.node_id,
            action: row.action,
            input_data: row.input_data,
            output_data: row.output_data,
            status: row.status.parse::<LogStatus>().map_err(DbError::Corrupt)?,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        })
    }
}
