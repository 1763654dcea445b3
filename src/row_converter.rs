//! Row conversion for fetched results
//!
//! Converts sqlx `AnyRow` values into [`QueryRows`]. The Any driver reports a
//! small fixed set of type names regardless of engine; anything richer must
//! be cast to text in the query. Types are read per value, since SQLite
//! expression columns carry no declared type.

use crate::error::DatabaseError;
use crate::types::{QueryRows, SqlValue};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

fn decode<'r, T>(row: &'r AnyRow, ordinal: usize, name: &str, kind: &str) -> Result<Option<T>, DatabaseError>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get::<Option<T>, _>(ordinal).map_err(|e| {
        DatabaseError::ExecutionError(format!(
            "Failed to extract column '{}' as {}: {}",
            name, kind, e
        ))
    })
}

/// Convert one row to its cell values, in column order
///
/// # Errors
/// Returns `ExecutionError` for a value that cannot be decoded as its
/// reported type, or for a type the Any driver does not expose.
pub fn row_values(row: &AnyRow) -> Result<Vec<SqlValue>, DatabaseError> {
    let mut values = Vec::with_capacity(row.columns().len());

    for column in row.columns() {
        let ordinal = column.ordinal();
        let name = column.name();
        let raw = row.try_get_raw(ordinal).map_err(|e| {
            DatabaseError::ExecutionError(format!("Failed to read column '{}': {}", name, e))
        })?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let value = match type_name.as_str() {
            "NULL" => SqlValue::Null,
            "BOOLEAN" | "BOOL" => decode::<bool>(row, ordinal, name, "BOOLEAN")?
                .map_or(SqlValue::Null, SqlValue::Bool),
            "SMALLINT" | "INTEGER" | "BIGINT" | "INT" | "INT2" | "INT4" | "INT8" => {
                decode::<i64>(row, ordinal, name, "INTEGER")?.map_or(SqlValue::Null, SqlValue::Int)
            }
            "REAL" | "FLOAT4" => decode::<f32>(row, ordinal, name, "REAL")?
                .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
            "DOUBLE" | "FLOAT" | "FLOAT8" => {
                decode::<f64>(row, ordinal, name, "DOUBLE")?.map_or(SqlValue::Null, SqlValue::Float)
            }
            "TEXT" | "VARCHAR" | "CHAR" => {
                decode::<String>(row, ordinal, name, "TEXT")?.map_or(SqlValue::Null, SqlValue::Text)
            }
            "BLOB" | "BYTEA" => {
                decode::<Vec<u8>>(row, ordinal, name, "BLOB")?.map_or(SqlValue::Null, SqlValue::Blob)
            }
            other => {
                return Err(DatabaseError::ExecutionError(format!(
                    "Unsupported column type '{}' for column '{}'. \
                     Cast it in the query, e.g. CAST({} AS TEXT)",
                    other, name, name
                )));
            }
        };

        values.push(value);
    }

    Ok(values)
}

/// Convert fetched rows, taking the header from the first row.
///
/// An empty result has an empty header: the Any driver exposes column
/// metadata only through rows.
pub fn rows_to_result(rows: &[AnyRow]) -> Result<QueryRows, DatabaseError> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows.iter().map(row_values).collect::<Result<Vec<_>, _>>()?;

    Ok(QueryRows { columns, rows })
}
