//! In-memory store backend.
//!
//! Backs the engine test-suite and the CLI `dry-run` command. One `Mutex`
//! guards all tables; every lock is released before any await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use nodes::Context;
use uuid::Uuid;

use crate::models::{
    ExecutionLog, ExecutionStatus, Flow, FlowEdge, FlowExecution, FlowNode,
};
use crate::store::{ExecutionLogStore, ExecutionStore, FlowStore, StoreError};

#[derive(Default)]
struct Tables {
    flows: HashMap<Uuid, Flow>,
    nodes: HashMap<Uuid, Vec<FlowNode>>,
    edges: HashMap<Uuid, Vec<FlowEdge>>,
    executions: HashMap<Uuid, FlowExecution>,
    logs: Vec<ExecutionLog>,
}

/// All five tables behind one shared handle.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a flow together with its structure.
    pub fn seed_flow(&self, flow: Flow, nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) {
        let mut tables = self.tables.lock().unwrap();
        tables.nodes.insert(flow.id, nodes);
        tables.edges.insert(flow.id, edges);
        tables.flows.insert(flow.id, flow);
    }

    /// Snapshot of every execution row, newest last. Test/inspection helper.
    pub fn executions_snapshot(&self) -> Vec<FlowExecution> {
        let mut executions: Vec<FlowExecution> = self
            .tables
            .lock()
            .unwrap()
            .executions
            .values()
            .cloned()
            .collect();
        executions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        executions
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn get_flow(&self, id: Uuid) -> Result<Flow, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .flows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        let mut flows: Vec<Flow> = self.tables.lock().unwrap().flows.values().cloned().collect();
        flows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(flows)
    }

    async fn create_flow(&self, flow: Flow) -> Result<Flow, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.nodes.entry(flow.id).or_default();
        tables.edges.entry(flow.id).or_default();
        tables.flows.insert(flow.id, flow.clone());
        Ok(flow)
    }

    async fn update_flow(&self, mut flow: Flow) -> Result<Flow, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.flows.contains_key(&flow.id) {
            return Err(StoreError::NotFound);
        }
        flow.updated_at = Utc::now();
        tables.flows.insert(flow.id, flow.clone());
        Ok(flow)
    }

    async fn delete_flow(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.flows.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.nodes.remove(&id);
        tables.edges.remove(&id);
        Ok(())
    }

    async fn get_nodes(&self, flow_id: Uuid) -> Result<Vec<FlowNode>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .nodes
            .get(&flow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_edges(&self, flow_id: Uuid) -> Result<Vec<FlowEdge>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .edges
            .get(&flow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_structure(
        &self,
        flow_id: Uuid,
        nodes: Vec<FlowNode>,
        edges: Vec<FlowEdge>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.flows.contains_key(&flow_id) {
            return Err(StoreError::NotFound);
        }
        tables.nodes.insert(flow_id, nodes);
        tables.edges.insert(flow_id, edges);
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create(&self, execution: FlowExecution) -> Result<FlowExecution, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .executions
            .insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get(&self, id: Uuid) -> Result<FlowExecution, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .executions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_step(
        &self,
        id: Uuid,
        current_node_id: &str,
        context: &Context,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let execution = tables.executions.get_mut(&id).ok_or(StoreError::NotFound)?;
        execution.current_node_id = Some(current_node_id.to_string());
        execution.context = context.clone();
        execution.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ExecutionStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let execution = tables.executions.get_mut(&id).ok_or(StoreError::NotFound)?;
        execution.status = status;
        execution.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogStore for MemoryStore {
    async fn append(&self, log: ExecutionLog) -> Result<(), StoreError> {
        self.tables.lock().unwrap().logs.push(log);
        Ok(())
    }

    async fn list(&self, execution_id: Uuid) -> Result<Vec<ExecutionLog>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|log| log.execution_id == execution_id)
            .cloned()
            .collect())
    }
}
