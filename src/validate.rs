//! Identifier validation for the statements the gateway builds itself
//!
//! The sample-rows resource interpolates a caller-supplied table name into a
//! fixed SELECT, so the name is checked here and then quoted per dialect.

use crate::error::DatabaseError;
use crate::types::DatabaseType;

/// Validate a table or schema identifier before interpolation
///
/// ## Validation Rules
///
/// - **Length**: 1-64 characters
/// - **Characters**: Only alphanumeric and underscore `[a-zA-Z0-9_]`
/// - **Start character**: Must be letter or underscore (not digit)
///
/// Reserved words are accepted because [`quote_identifier`] always quotes.
///
/// ## Example
///
/// ```rust
/// use sql_gateway::validate::validate_identifier;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// validate_identifier("users")?;
/// validate_identifier("order")?;
/// validate_identifier("_private")?;
///
/// # assert!(validate_identifier("users; DROP TABLE users").is_err());
/// # assert!(validate_identifier("users\"").is_err());
/// # assert!(validate_identifier("").is_err());
/// # assert!(validate_identifier("123table").is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_identifier(name: &str) -> Result<(), DatabaseError> {
    if name.is_empty() {
        return Err(DatabaseError::ExecutionError(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > 64 {
        return Err(DatabaseError::ExecutionError(format!(
            "Identifier too long: {} characters (max 64)",
            name.len()
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::ExecutionError(format!(
            "Invalid identifier: '{}'. Only alphanumeric and underscore allowed",
            name
        )));
    }

    if let Some(first_char) = name.chars().next()
        && first_char.is_ascii_digit()
    {
        return Err(DatabaseError::ExecutionError(format!(
            "Identifier cannot start with digit: '{}'",
            name
        )));
    }

    Ok(())
}

/// Quote an already validated identifier for `db_type`.
pub fn quote_identifier(name: &str, db_type: DatabaseType) -> String {
    if db_type.is_mysql_family() {
        format!("`{}`", name.replace('`', "``"))
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_injection_shapes() {
        for name in ["t; DROP TABLE t", "t)", "t'", "t--", "a.b", "naïve"] {
            assert!(validate_identifier(name).is_err(), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_length_limit() {
        assert!(validate_identifier(&"a".repeat(64)).is_ok());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("users", DatabaseType::Postgres), "\"users\"");
        assert_eq!(quote_identifier("users", DatabaseType::SQLite), "\"users\"");
        assert_eq!(quote_identifier("users", DatabaseType::MariaDB), "`users`");
    }
}
