//! Error types for gateway operations

use crate::classifier::Verdict;
use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Gateway and database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Statement rejected by the classifier; never reached the database
    #[error("Policy violation: {0}")]
    PolicyViolation(Verdict),

    /// Statement was allowed but the database refused or failed it
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Requested table or schema does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid startup configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// sqlx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// Errors the caller caused and can act on, as opposed to server faults.
    /// Pool exhaustion, I/O and protocol failures stay server faults.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            Self::PolicyViolation(_)
                | Self::ExecutionError(_)
                | Self::NotFound(_)
                | Self::Sqlx(sqlx::Error::Database(_))
        )
    }
}

/// Convert DatabaseError to McpError
impl From<DatabaseError> for McpError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::PolicyViolation(verdict) => McpError::invalid_request(
                format!("[Policy] {}", verdict),
                Some(serde_json::json!({ "verdict": verdict.label() })),
            ),
            DatabaseError::ExecutionError(msg) => {
                McpError::internal_error(format!("[DB Query] {}", msg), None)
            }
            DatabaseError::NotFound(msg) => {
                McpError::resource_not_found(format!("[Table] {}", msg), None)
            }
            DatabaseError::ConfigurationError(msg) => {
                McpError::internal_error(format!("[Config] {}", msg), None)
            }
            DatabaseError::Sqlx(sqlx_err) => convert_sqlx_error(sqlx_err),
            DatabaseError::UrlParse(url_err) => {
                McpError::invalid_params(format!("[URL Parse] {}", url_err), None)
            }
            DatabaseError::Io(io_err) => McpError::internal_error(format!("[IO] {}", io_err), None),
        }
    }
}

/// Convert sqlx errors to McpError with detailed error handling
fn convert_sqlx_error(err: sqlx::Error) -> McpError {
    match err {
        sqlx::Error::Configuration(msg) => {
            McpError::internal_error(format!("Database configuration error: {}", msg), None)
        }
        sqlx::Error::Database(db_err) => {
            McpError::internal_error(format!("Database error: {}", db_err), None)
        }
        sqlx::Error::RowNotFound => {
            McpError::resource_not_found("No rows returned by query".to_string(), None)
        }
        sqlx::Error::ColumnNotFound(col) => {
            McpError::invalid_params(format!("Column not found: {}", col), None)
        }
        sqlx::Error::PoolTimedOut => {
            McpError::internal_error("Connection pool timed out".to_string(), None)
        }
        sqlx::Error::PoolClosed => {
            McpError::internal_error("Connection pool closed".to_string(), None)
        }
        _ => McpError::internal_error(format!("Database error: {}", err), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_failures_are_server_faults() {
        assert!(!DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).is_caller_visible());
        assert!(!DatabaseError::Sqlx(sqlx::Error::PoolClosed).is_caller_visible());
        assert!(!DatabaseError::ConfigurationError("x".into()).is_caller_visible());
        assert!(DatabaseError::ExecutionError("syntax error".into()).is_caller_visible());
        assert!(DatabaseError::NotFound("t".into()).is_caller_visible());
    }
}
