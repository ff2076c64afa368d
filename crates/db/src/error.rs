//! Typed error type for the db crate.

use engine::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted payload no longer deserialises into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}
