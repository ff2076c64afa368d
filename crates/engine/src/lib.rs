//! `engine` crate — core domain models, the flow graph, and the execution
//! engine that walks it.

pub mod error;
pub mod executor;
pub mod graph;
pub mod memory;
pub mod models;
pub mod store;
pub mod trigger;

pub use error::EngineError;
pub use executor::{EngineConfig, FlowEngine, TestResult};
pub use graph::FlowGraph;
pub use models::{
    ExecutionLog, ExecutionStatus, Flow, FlowEdge, FlowExecution, FlowNode, FlowStatus, LogStatus,
};
pub use store::{ExecutionLogStore, ExecutionStore, FlowStore, StoreError};
