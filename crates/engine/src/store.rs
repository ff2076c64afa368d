//! Store traits — the persistence seams the engine runs against.
//!
//! The engine only ever sees these traits; Postgres implementations live in
//! the `db` crate and an in-memory implementation in [`crate::memory`], so
//! tests and dry runs never need a database.

use async_trait::async_trait;
use nodes::Context;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ExecutionLog, ExecutionStatus, Flow, FlowEdge, FlowExecution, FlowNode,
};

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read/write access to flow definitions and their graph structure.
///
/// The engine itself only reads (`get_flow`, `get_nodes`, `get_edges`);
/// the remaining operations serve the authoring API.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn get_flow(&self, id: Uuid) -> Result<Flow, StoreError>;
    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError>;
    async fn create_flow(&self, flow: Flow) -> Result<Flow, StoreError>;
    async fn update_flow(&self, flow: Flow) -> Result<Flow, StoreError>;
    async fn delete_flow(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get_nodes(&self, flow_id: Uuid) -> Result<Vec<FlowNode>, StoreError>;
    async fn get_edges(&self, flow_id: Uuid) -> Result<Vec<FlowEdge>, StoreError>;

    /// Replace-all semantics: atomically delete and reinsert the flow's
    /// structure. Structure saves are never incremental diffs.
    async fn replace_structure(
        &self,
        flow_id: Uuid,
        nodes: Vec<FlowNode>,
        edges: Vec<FlowEdge>,
    ) -> Result<(), StoreError>;
}

/// Mutable state of execution runs.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, execution: FlowExecution) -> Result<FlowExecution, StoreError>;
    async fn get(&self, id: Uuid) -> Result<FlowExecution, StoreError>;

    /// Persist the step pointer and accumulated context together.
    async fn update_step(
        &self,
        id: Uuid,
        current_node_id: &str,
        context: &Context,
    ) -> Result<(), StoreError>;

    async fn update_status(&self, id: Uuid, status: ExecutionStatus) -> Result<(), StoreError>;
}

/// Append-only audit sink. No update or delete operations exist.
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn append(&self, log: ExecutionLog) -> Result<(), StoreError>;

    /// Logs for one execution, ordered by creation time.
    async fn list(&self, execution_id: Uuid) -> Result<Vec<ExecutionLog>, StoreError>;
}
