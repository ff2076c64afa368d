//! Execution repository functions.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use engine::{ExecutionStatus, FlowExecution};
use nodes::Context;

use crate::models::FlowExecutionRow;
use crate::DbError;

/// Insert a new execution row.
pub async fn create_execution(
    pool: &PgPool,
    execution: &FlowExecution,
) -> Result<FlowExecutionRow, DbError> {
    let row = sqlx::query_as::<_, FlowExecutionRow>(
        r#"
        INSERT INTO flow_executions
            (id, flow_id, whatsapp_number_id, contact_number, status,
             current_node_id, context, metadata, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, flow_id, whatsapp_number_id, contact_number, status,
                  current_node_id, context, metadata, created_at, updated_at
        "#,
    )
    .bind(execution.id)
    .bind(execution.flow_id)
    .bind(&execution.whatsapp_number_id)
    .bind(&execution.contact_number)
    .bind(execution.status.to_string())
    .bind(&execution.current_node_id)
    .bind(Value::Object(execution.context.clone()))
    .bind(Value::Object(execution.metadata.clone()))
    .bind(execution.created_at)
    .bind(execution.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<FlowExecutionRow, DbError> {
    let row = sqlx::query_as::<_, FlowExecutionRow>(
        r#"
        SELECT id, flow_id, whatsapp_number_id, contact_number, status,
               current_node_id, context, metadata, created_at, updated_at
        FROM flow_executions WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Persist the step pointer and accumulated context together.
pub async fn update_step(
    pool: &PgPool,
    id: Uuid,
    current_node_id: &str,
    context: &Context,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE flow_executions
        SET current_node_id = $1, context = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(current_node_id)
    .bind(Value::Object(context.clone()))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Update the execution's status.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: ExecutionStatus,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"UPDATE flow_executions SET status = $1, updated_at = NOW() WHERE id = $2"#,
    )
    .bind(status.to_string())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
