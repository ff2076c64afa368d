//! [`PgStore`] — the engine's store traits backed by Postgres.
//!
//! A thin translation layer: repository rows in, domain types out. The
//! engine never sees sqlx.

use async_trait::async_trait;
use nodes::Context;
use uuid::Uuid;

use engine::{
    ExecutionLog, ExecutionLogStore, ExecutionStatus, ExecutionStore, Flow, FlowEdge,
    FlowExecution, FlowNode, FlowStore, StoreError,
};

use crate::repository::{executions, flows, logs};
use crate::{DbError, DbPool};

/// One handle implements all three store traits; clone freely.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl FlowStore for PgStore {
    async fn get_flow(&self, id: Uuid) -> Result<Flow, StoreError> {
        let row = flows::get_flow(&self.pool, id).await?;
        Ok(Flow::try_from(row).map_err(StoreError::from)?)
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        let rows = flows::list_flows(&self.pool).await?;
        rows.into_iter()
            .map(|row| Flow::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn create_flow(&self, flow: Flow) -> Result<Flow, StoreError> {
        let row = flows::create_flow(&self.pool, &flow).await?;
        Ok(Flow::try_from(row).map_err(StoreError::from)?)
    }

    async fn update_flow(&self, flow: Flow) -> Result<Flow, StoreError> {
        flows::update_flow(&self.pool, &flow).await?;
        self.get_flow(flow.id).await
    }

    async fn delete_flow(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(flows::delete_flow(&self.pool, id).await?)
    }

    async fn get_nodes(&self, flow_id: Uuid) -> Result<Vec<FlowNode>, StoreError> {
        let rows = flows::get_nodes(&self.pool, flow_id).await?;
        rows.into_iter()
            .map(|row| FlowNode::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn get_edges(&self, flow_id: Uuid) -> Result<Vec<FlowEdge>, StoreError> {
        let rows = flows::get_edges(&self.pool, flow_id).await?;
        Ok(rows.into_iter().map(FlowEdge::from).collect())
    }

    async fn replace_structure(
        &self,
        flow_id: Uuid,
        nodes: Vec<FlowNode>,
        edges: Vec<FlowEdge>,
    ) -> Result<(), StoreError> {
        Ok(flows::replace_structure(&self.pool, flow_id, &nodes, &edges).await?)
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn create(&self, execution: FlowExecution) -> Result<FlowExecution, StoreError> {
        let row = executions::create_execution(&self.pool, &execution).await?;
        Ok(FlowExecution::try_from(row).map_err(StoreError::from)?)
    }

    async fn get(&self, id: Uuid) -> Result<FlowExecution, StoreError> {
        let row = executions::get_execution(&self.pool, id).await?;
        Ok(FlowExecution::try_from(row).map_err(StoreError::from)?)
    }

    async fn update_step(
        &self,
        id: Uuid,
        current_node_id: &str,
        context: &Context,
    ) -> Result<(), StoreError> {
        Ok(executions::update_step(&self.pool, id, current_node_id, context).await?)
    }

    async fn update_status(&self, id: Uuid, status: ExecutionStatus) -> Result<(), StoreError> {
        Ok(executions::update_status(&self.pool, id, status).await?)
    }
}

#[async_trait]
impl ExecutionLogStore for PgStore {
    async fn append(&self, log: ExecutionLog) -> Result<(), StoreError> {
        Ok(logs::insert_log(&self.pool, &log).await?)
    }

    async fn list(&self, execution_id: Uuid) -> Result<Vec<ExecutionLog>, StoreError> {
        let rows = logs::list_logs(&self.pool, execution_id).await?;
        rows.into_iter()
            .map(|row| ExecutionLog::try_from(row).map_err(StoreError::from))
            .collect()
    }
}
