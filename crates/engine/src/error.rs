//! Engine-level error types.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::ExecutionStatus;
use crate::store::StoreError;
use nodes::NodeError;

/// Errors produced by the flow engine (graph validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Graph errors ------

    /// The flow does not exist, or has no start node to execute from.
    #[error("flow {0} not found or has no start node")]
    FlowNotFound(Uuid),

    /// An edge points at a node that is not part of the graph.
    #[error("node '{node_id}' not found in flow graph")]
    NodeNotFound { node_id: String },

    /// Structural violation: multiple start nodes, duplicate node IDs, or a
    /// dead-end node with no outgoing edge.
    #[error("invalid flow graph: {0}")]
    InvalidGraph(String),

    // ------ Execution errors ------

    /// A branch selection produced a handle with no corresponding edge.
    #[error("no outgoing edge from node '{node_id}' matches handle {handle:?}")]
    NoMatchingEdge {
        node_id: String,
        handle: Option<String>,
    },

    /// The cycle/runaway guard tripped.
    #[error("execution exceeded the {limit}-step ceiling")]
    MaxStepsExceeded { limit: usize },

    /// A node executor ran past its per-invocation deadline.
    #[error("node '{node_id}' timed out after {timeout:?}")]
    NodeTimeout { node_id: String, timeout: Duration },

    /// A node executor failed (adapter error, unsupported action, …).
    #[error("node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: NodeError,
    },

    /// Pause/resume requested against an execution in the wrong state.
    #[error("execution {execution_id} is {status}, cannot {operation}")]
    InvalidTransition {
        execution_id: Uuid,
        status: ExecutionStatus,
        operation: &'static str,
    },

    /// Persistence error from whichever store backs the engine.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
