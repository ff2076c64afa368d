//! Flow CRUD and graph-structure operations.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use engine::{Flow, FlowEdge, FlowNode};

use crate::models::{FlowEdgeRow, FlowNodeRow, FlowRow};
use crate::DbError;

/// Insert a new flow.
pub async fn create_flow(pool: &PgPool, flow: &Flow) -> Result<FlowRow, DbError> {
    let row = sqlx::query_as::<_, FlowRow>(
        r#"
        INSERT INTO flows
            (id, name, description, status, trigger_conditions, metadata, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, name, description, status, trigger_conditions, metadata, created_by, created_at, updated_at
        "#,
    )
    .bind(flow.id)
    .bind(&flow.name)
    .bind(&flow.description)
    .bind(flow.status.to_string())
    .bind(Value::Object(flow.trigger_conditions.clone()))
    .bind(Value::Object(flow.metadata.clone()))
    .bind(flow.created_by)
    .bind(flow.created_at)
    .bind(flow.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single flow by its primary key.
pub async fn get_flow(pool: &PgPool, id: Uuid) -> Result<FlowRow, DbError> {
    let row = sqlx::query_as::<_, FlowRow>(
        r#"
        SELECT id, name, description, status, trigger_conditions, metadata, created_by, created_at, updated_at
        FROM flows WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return all flows ordered by creation time (newest first).
pub async fn list_flows(pool: &PgPool) -> Result<Vec<FlowRow>, DbError> {
    let rows = sqlx::query_as::<_, FlowRow>(
        r#"
        SELECT id, name, description, status, trigger_conditions, metadata, created_by, created_at, updated_at
        FROM flows ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Update a flow's mutable fields.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn update_flow(pool: &PgPool, flow: &Flow) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE flows
        SET name = $1, description = $2, status = $3,
            trigger_conditions = $4, metadata = $5, updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(&flow.name)
    .bind(&flow.description)
    .bind(flow.status.to_string())
    .bind(Value::Object(flow.trigger_conditions.clone()))
    .bind(Value::Object(flow.metadata.clone()))
    .bind(flow.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Permanently delete a flow (structure rows cascade).
pub async fn delete_flow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM flows WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// All nodes of a flow, in insertion order.
pub async fn get_nodes(pool: &PgPool, flow_id: Uuid) -> Result<Vec<FlowNodeRow>, DbError> {
    let rows = sqlx::query_as::<_, FlowNodeRow>(
        r#"SELECT id, flow_id, node_id, type, position, data FROM flow_nodes WHERE flow_id = $1 ORDER BY id"#,
    )
    .bind(flow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All edges of a flow, in insertion order.
pub async fn get_edges(pool: &PgPool, flow_id: Uuid) -> Result<Vec<FlowEdgeRow>, DbError> {
    let rows = sqlx::query_as::<_, FlowEdgeRow>(
        r#"
        SELECT id, flow_id, edge_id, source, target, source_handle, target_handle, data
        FROM flow_edges WHERE flow_id = $1 ORDER BY id
        "#,
    )
    .bind(flow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Replace a flow's entire structure in one transaction.
///
/// Structure saves are always full batches: delete everything, reinsert
/// everything. There are no incremental diffs.
pub async fn replace_structure(
    pool: &PgPool,
    flow_id: Uuid,
    nodes: &[FlowNode],
    edges: &[FlowEdge],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM flow_nodes WHERE flow_id = $1")
        .bind(flow_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM flow_edges WHERE flow_id = $1")
        .bind(flow_id)
        .execute(&mut *tx)
        .await?;

    for node in nodes {
        let (node_type, data) = node.kind.to_parts();
        sqlx::query(
            r#"
            INSERT INTO flow_nodes (id, flow_id, node_id, type, position, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(flow_id)
        .bind(&node.node_id)
        .bind(node_type)
        .bind(serde_json::to_value(node.position).unwrap_or(Value::Null))
        .bind(data)
        .execute(&mut *tx)
        .await?;
    }

    for edge in edges {
        sqlx::query(
            r#"
            INSERT INTO flow_edges
                (id, flow_id, edge_id, source, target, source_handle, target_handle, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(flow_id)
        .bind(&edge.edge_id)
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(&edge.source_handle)
        .bind(&edge.target_handle)
        .bind(&edge.data)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
