//! Core domain models for the flow engine.
//!
//! These types are the source of truth for what a flow and its executions
//! look like in memory. Persistence rows map 1-to-1 onto them in the `db`
//! crate; the editor wire format maps onto them through the `*Spec` types at
//! the bottom of this module.

use chrono::{DateTime, Utc};
use nodes::{Context, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Lifecycle state of a flow definition. Owned by the authoring side; the
/// engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Draft,
    Active,
    Inactive,
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for FlowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown flow status: {other}")),
        }
    }
}

/// A named automation definition. The graph itself (nodes/edges) is stored
/// separately and loaded on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: FlowStatus,
    /// Opaque key/value map matched against inbound messages (see
    /// [`crate::trigger`]).
    pub trigger_conditions: Context,
    pub metadata: Context,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    /// Convenience constructor for a draft flow.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: FlowStatus::Draft,
            trigger_conditions: Context::new(),
            metadata: Context::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Editor canvas position. Irrelevant to execution, preserved for the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A vertex in the flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    /// Unique within the flow, stable across edits (referenced by edges).
    pub node_id: String,
    pub kind: NodeKind,
    pub position: Position,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub edge_id: String,
    pub source: String,
    pub target: String,
    /// Branch discriminator on condition nodes (`"true"`/`"false"`).
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// Status of one flow run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Paused,
}

impl ExecutionStatus {
    /// Terminal states are never re-entered by the engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One run of a flow — the central mutable state entity. The engine is its
/// sole writer while the run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowExecution {
    pub id: Uuid,
    pub flow_id: Uuid,
    /// Channel identifier (WhatsApp number id, or `"test"` for dry runs).
    pub whatsapp_number_id: String,
    pub contact_number: String,
    pub status: ExecutionStatus,
    pub current_node_id: Option<String>,
    /// Accumulated key/value map carried and merged across steps.
    pub context: Context,
    pub metadata: Context,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowExecution {
    pub fn new(
        flow_id: Uuid,
        whatsapp_number_id: impl Into<String>,
        contact_number: impl Into<String>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow_id,
            whatsapp_number_id: whatsapp_number_id.into(),
            contact_number: contact_number.into(),
            status: ExecutionStatus::Running,
            current_node_id: None,
            context,
            metadata: Context::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution logs
// ---------------------------------------------------------------------------

/// Outcome recorded on a single log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
    Warning,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

impl std::str::FromStr for LogStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            other => Err(format!("unknown log status: {other}")),
        }
    }
}

/// One immutable record per executed node. Rows are append-only and totally
/// ordered by `created_at`, mirroring traversal order 1:1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    /// Derived label, e.g. `execute_message`, or `resolve_edge` /
    /// `resolve_node` / `max_steps` for traversal failures.
    pub action: String,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub status: LogStatus,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl ExecutionLog {
    pub fn step(
        execution_id: Uuid,
        node_id: impl Into<String>,
        action: impl Into<String>,
        input: &Context,
        output: Option<Context>,
        status: LogStatus,
        error_message: Option<String>,
        duration_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            node_id: node_id.into(),
            action: action.into(),
            input_data: Value::Object(input.clone()),
            output_data: output.map(Value::Object),
            status,
            error_message,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Editor wire format
// ---------------------------------------------------------------------------

/// A node as the flow editor sends it (`{id, type, position, data}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: Value,
}

impl NodeSpec {
    pub fn into_node(self) -> Result<FlowNode, EngineError> {
        let kind = NodeKind::from_parts(&self.kind, self.data)
            .map_err(|e| EngineError::InvalidGraph(format!("node '{}': {e}", self.id)))?;
        Ok(FlowNode {
            node_id: self.id,
            kind,
            position: self.position,
        })
    }
}

/// An edge as the flow editor sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl EdgeSpec {
    pub fn into_edge(self) -> FlowEdge {
        FlowEdge {
            edge_id: self.id,
            source: self.source,
            target: self.target,
            source_handle: self.source_handle,
            target_handle: self.target_handle,
            data: self.data,
        }
    }
}

/// A complete flow file, as consumed by `validate`/`dry-run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    #[serde(default)]
    pub trigger_conditions: Context,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl FlowSpec {
    /// Split into domain parts, validating every node payload.
    pub fn into_parts(self) -> Result<(Flow, Vec<FlowNode>, Vec<FlowEdge>), EngineError> {
        let mut flow = Flow::new(self.name);
        flow.status = FlowStatus::Active;
        flow.trigger_conditions = self.trigger_conditions;
        let nodes = self
            .nodes
            .into_iter()
            .map(NodeSpec::into_node)
            .collect::<Result<Vec<_>, _>>()?;
        let edges = self.edges.into_iter().map(EdgeSpec::into_edge).collect();
        Ok((flow, nodes, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_spec_parses_editor_payload() {
        let spec: NodeSpec = serde_json::from_value(json!({
            "id": "node-1",
            "type": "message",
            "position": { "x": 120.0, "y": 80.0 },
            "data": { "label": "Saudação", "message": "Olá!" },
        }))
        .unwrap();

        let node = spec.into_node().unwrap();
        assert_eq!(node.node_id, "node-1");
        assert!(matches!(node.kind, NodeKind::Message(_)));
    }

    #[test]
    fn edge_spec_accepts_camel_case_handles() {
        let spec: EdgeSpec = serde_json::from_value(json!({
            "id": "edge-1",
            "source": "cond",
            "target": "msg",
            "sourceHandle": "true",
        }))
        .unwrap();

        let edge = spec.into_edge();
        assert_eq!(edge.source_handle.as_deref(), Some("true"));
        assert!(edge.target_handle.is_none());
    }

    #[test]
    fn invalid_node_payload_is_an_invalid_graph() {
        let spec: NodeSpec = serde_json::from_value(json!({
            "id": "node-1",
            "type": "teleport",
            "data": {},
        }))
        .unwrap();

        assert!(matches!(
            spec.into_node(),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn execution_statuses_roundtrip_through_strings() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Paused,
        ] {
            let parsed: ExecutionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
