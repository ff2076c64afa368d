//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node executor.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable` — the adapter call is re-attempted with exponential back-off.
/// - everything else — the execution is immediately marked as failed.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Transient adapter failure; the engine should re-try the call.
    #[error("retryable adapter error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),

    /// An action node carries a type tag no dispatcher exists for.
    #[error("unsupported action type '{0}'")]
    UnsupportedAction(String),

    /// A condition node carries a type tag no strategy exists for.
    ///
    /// Condition nodes must always produce a branch, so the evaluator turns
    /// this into a warning on the false branch instead of failing the step.
    #[error("unsupported condition type '{0}'")]
    UnsupportedConditionType(String),
}

impl NodeError {
    /// Whether the engine's bounded-retry policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
