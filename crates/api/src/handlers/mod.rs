//! Request handlers, grouped per resource.

use axum::http::StatusCode;

use engine::{EngineError, StoreError};

pub mod executions;
pub mod flows;
pub mod webhooks;

/// Map a store failure onto an HTTP status.
pub(crate) fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map an engine failure onto an HTTP status.
///
/// Runtime failures of an execution that was successfully started are not
/// mapped here — the caller already has the execution id and polls for the
/// terminal status.
pub(crate) fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::FlowNotFound(_) | EngineError::NodeNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::InvalidGraph(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::Store(err) => store_status(err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
