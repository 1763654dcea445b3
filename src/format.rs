//! Text rendering of gateway results for the tool surface

use crate::types::{QueryResult, QueryRows, SqlValue};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const EMPTY_RESULT: &str = "Query returned no rows.";

/// Render a result as the text returned by `execute_sql`
///
/// Reads become comma-delimited text with a header row; writes become a
/// success message with the affected row count.
///
/// ```
/// # use sql_gateway::format::render_result;
/// # use sql_gateway::types::{QueryResult, QueryRows, SqlValue};
/// let rows = QueryRows {
///     columns: vec!["id".into(), "name".into()],
///     rows: vec![vec![SqlValue::Int(1), SqlValue::Text("Ada, Countess".into())]],
/// };
/// assert_eq!(
///     render_result(&QueryResult::Rows(rows)),
///     "id,name\n1,\"Ada, Countess\""
/// );
/// assert_eq!(
///     render_result(&QueryResult::Affected(3)),
///     "Query executed successfully. Rows affected: 3"
/// );
/// ```
pub fn render_result(result: &QueryResult) -> String {
    match result {
        QueryResult::Rows(rows) => render_rows(rows),
        QueryResult::Affected(count) => {
            format!("Query executed successfully. Rows affected: {}", count)
        }
    }
}

pub fn render_rows(rows: &QueryRows) -> String {
    if rows.columns.is_empty() && rows.is_empty() {
        return EMPTY_RESULT.to_string();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        rows.columns
            .iter()
            .map(|c| escape_field(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &rows.rows {
        lines.push(row.iter().map(render_value).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Text(s) => escape_field(s),
        SqlValue::Blob(bytes) => format!("base64:{}", STANDARD.encode(bytes)),
    }
}

/// Quote a field when it holds a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_and_blobs() {
        let rows = QueryRows {
            columns: vec!["a".into(), "b".into(), "c".into()],
            rows: vec![vec![
                SqlValue::Null,
                SqlValue::Blob(vec![0xde, 0xad]),
                SqlValue::Text("say \"hi\"".into()),
            ]],
        };
        assert_eq!(render_rows(&rows), "a,b,c\nNULL,base64:3q0=,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_header_only() {
        let rows = QueryRows {
            columns: vec!["table_name".into()],
            rows: vec![],
        };
        assert_eq!(render_rows(&rows), "table_name");
    }

    #[test]
    fn test_empty_without_header() {
        assert_eq!(render_rows(&QueryRows::default()), EMPTY_RESULT);
    }
}
