//! Per-statement timeout for database operations
//!
//! Statements run exactly once: a timeout or driver failure is reported to
//! the caller, never retried.

use crate::error::DatabaseError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Execute a database operation with timeout protection
///
/// # Arguments
///
/// * `limit` - Maximum time the operation may take
/// * `operation` - The sqlx future to await
/// * `operation_description` - Human-readable description for error messages
///
/// # Example
///
/// ```rust
/// # use sql_gateway::timeout::execute_with_timeout;
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), sql_gateway::error::DatabaseError> {
/// let rows = execute_with_timeout(
///     Duration::from_secs(5),
///     async { Ok::<Vec<u8>, sqlx::Error>(vec![1, 2]) },
///     "Fetching users",
/// )
/// .await?;
/// assert_eq!(rows.len(), 2);
/// # Ok(())
/// # }
/// ```
pub async fn execute_with_timeout<T, Fut>(
    limit: Duration,
    operation: Fut,
    operation_description: &str,
) -> Result<T, DatabaseError>
where
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(limit, operation).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(sqlx_err)) => Err(DatabaseError::ExecutionError(format!(
            "{}: {}",
            operation_description,
            describe_sqlx_error(&sqlx_err)
        ))),
        Err(_elapsed) => Err(DatabaseError::ExecutionError(format!(
            "{} timed out after {:?}. Narrow the query with WHERE or LIMIT, \
             or raise DB_QUERY_TIMEOUT_SECS",
            operation_description, limit
        ))),
    }
}

/// Database errors carry the server message; everything else uses Display.
fn describe_sqlx_error(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}
