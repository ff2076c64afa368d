//! Adapter traits — the contracts the executors call external services
//! through.
//!
//! Defined here (in the nodes crate) so both the engine and concrete adapter
//! implementations can import them without a circular dependency. Every
//! adapter is injected at construction time; no process-wide state backs any
//! of them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::NodeError;

/// The mutable key/value map carried and merged across steps.
pub type Context = serde_json::Map<String, Value>;

/// Identity of the execution a node runs inside.
///
/// Carries the channel and contact so delivery adapters know where a message
/// goes; the variable map travels separately as [`Context`].
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// ID of the parent flow.
    pub flow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// Channel identifier (WhatsApp number id or `"test"` for dry runs).
    pub channel_id: String,
    /// The end-user being conversed with.
    pub contact: String,
}

/// What a single node execution produced.
#[derive(Debug, Clone, Default)]
pub struct NodeOutcome {
    /// Merged into the execution context after the step is logged.
    pub output: Context,
    /// Set by condition nodes: the outgoing handle to follow.
    pub selected_handle: Option<String>,
    /// Set by end nodes: stop traversal, mark the execution completed.
    pub terminal: bool,
    /// Degraded-but-successful step (e.g. unknown condition type); the log
    /// row is recorded with warning status.
    pub warning: Option<String>,
}

impl NodeOutcome {
    /// A plain successful step.
    pub fn next(output: Context) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    /// A condition result selecting one branch handle.
    pub fn branch(output: Context, handle: impl Into<String>) -> Self {
        Self {
            output,
            selected_handle: Some(handle.into()),
            ..Self::default()
        }
    }

    /// A terminal (end-node) result.
    pub fn finished(output: Context) -> Self {
        Self {
            output,
            terminal: true,
            ..Self::default()
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Sends an outbound message to a contact on a channel.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    /// Deliver `body` and return the provider's delivery result.
    async fn send(&self, channel_id: &str, to: &str, body: &str) -> Result<Value, NodeError>;
}

/// Decides whether free text matches a named intent (AI-backed).
#[async_trait]
pub trait IntentEvaluator: Send + Sync {
    async fn matches_intent(&self, intent: &str, content: &str) -> Result<bool, NodeError>;
}

/// Posts an action payload to an external webhook.
#[async_trait]
pub trait WebhookCaller: Send + Sync {
    async fn call(&self, url: &str, payload: &Value) -> Result<Value, NodeError>;
}

/// Hands the conversation over to another chatbot or a human department.
#[async_trait]
pub trait TransferDispatcher: Send + Sync {
    async fn to_chatbot(&self, chatbot_id: &str, contact: &str) -> Result<Value, NodeError>;
    async fn to_department(&self, department: &str, contact: &str) -> Result<Value, NodeError>;
}

/// The full set of adapters an execution runs against.
///
/// Cloning is cheap; all members are shared trait objects.
#[derive(Clone)]
pub struct AdapterSet {
    pub delivery: Arc<dyn MessageDelivery>,
    pub intent: Arc<dyn IntentEvaluator>,
    pub webhook: Arc<dyn WebhookCaller>,
    pub transfer: Arc<dyn TransferDispatcher>,
}
