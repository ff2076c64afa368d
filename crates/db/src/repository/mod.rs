//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no branching on domain state — pure SQL.

pub mod executions;
pub mod flows;
pub mod logs;
