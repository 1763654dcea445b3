//! Row cap for caller SELECT statements

use crate::error::DatabaseError;
use crate::sql_parser::extract_first_keyword;
use crate::types::DatabaseType;
use lazy_regex::{Lazy, Regex, lazy_regex};

// Only a LIMIT that closes the statement counts; subquery limits are left alone
static TRAILING_LIMIT: Lazy<Regex> =
    lazy_regex!(r"(?i)\bLIMIT\s+(\d+)(\s+OFFSET\s+\d+)?\s*;?\s*$");

/// Apply row limit to SELECT queries only
///
/// # Behavior
/// - A trailing LIMIT smaller than `max_rows` is kept
/// - A trailing LIMIT larger than `max_rows` is lowered to `max_rows`
/// - Otherwise `LIMIT max_rows` is appended, before any final semicolon
/// - Non-SELECT statements are returned unchanged
///
/// # Examples
/// ```
/// # use sql_gateway::sql_limiter::apply_row_limit;
/// # use sql_gateway::types::DatabaseType;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limited = apply_row_limit("SELECT * FROM users", 100, DatabaseType::Postgres)?;
/// assert_eq!(limited, "SELECT * FROM users LIMIT 100");
///
/// let limited = apply_row_limit("SELECT * FROM users LIMIT 200;", 100, DatabaseType::Postgres)?;
/// assert_eq!(limited, "SELECT * FROM users LIMIT 100;");
/// # Ok(())
/// # }
/// ```
pub fn apply_row_limit(
    sql: &str,
    max_rows: usize,
    db_type: DatabaseType,
) -> Result<String, DatabaseError> {
    if extract_first_keyword(sql, db_type)? != "select" {
        return Ok(sql.to_string());
    }

    let trimmed = sql.trim();

    if let Some(captures) = TRAILING_LIMIT.captures(trimmed) {
        let existing: usize = captures[1].parse().map_err(|e| {
            DatabaseError::ExecutionError(format!("Invalid LIMIT value: {}", e))
        })?;
        if existing <= max_rows {
            return Ok(trimmed.to_string());
        }
        let offset = captures.get(2).map_or("", |m| m.as_str());
        let semicolon = if trimmed.ends_with(';') { ";" } else { "" };
        let start = captures.get(0).map_or(trimmed.len(), |m| m.start());
        return Ok(format!(
            "{}LIMIT {}{}{}",
            &trimmed[..start],
            max_rows,
            offset,
            semicolon
        ));
    }

    let (body, semicolon) = match trimmed.strip_suffix(';') {
        Some(body) => (body.trim_end(), ";"),
        None => (trimmed, ""),
    };
    Ok(format!("{} LIMIT {}{}", body, max_rows, semicolon))
}
