//! Execution log repository functions.
//!
//! Logs are append-only by design: this module exposes exactly one insert
//! and one ordered read. No update or delete exists anywhere in the schema
//! access layer.

use sqlx::PgPool;
use uuid::Uuid;

use engine::ExecutionLog;

use crate::models::FlowExecutionLogRow;
use crate::DbError;

/// Append one log row.
pub async fn insert_log(pool: &PgPool, log: &ExecutionLog) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO flow_execution_logs
            (id, execution_id, node_id, action, input_data, output_data,
             status, error_message, duration_ms, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(log.id)
    .bind(log.execution_id)
    .bind(&log.node_id)
    .bind(&log.action)
    .bind(&log.input_data)
    .bind(&log.output_data)
    .bind(log.status.to_string())
    .bind(&log.error_message)
    .bind(log.duration_ms)
    .bind(log.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// All logs for one execution, ordered by creation time.
pub async fn list_logs(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<FlowExecutionLogRow>, DbError> {
    let rows = sqlx::query_as::<_, FlowExecutionLogRow>(
        r#"
        SELECT id, execution_id, node_id, action, input_data, output_data,
               status, error_message, duration_ms, created_at
        FROM flow_execution_logs
        WHERE execution_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
