//! Schema introspection over fixed catalog queries
//!
//! Statements built here never pass through the classifier: their text is
//! fixed and every name is either a bound parameter or a validated, quoted
//! identifier.

use crate::connection::QueryRunner;
use crate::error::DatabaseError;
use crate::schema_queries::{CatalogQueries, catalog_for};
use crate::types::{
    ColumnDescriptor, DatabaseType, ForeignKeyRef, LookupErrorKind, QueryRows, Record, TableDescriptor,
    TableKind, TableLookupError, TableSchema, TableSchemasReport,
};
use crate::validate::{quote_identifier, validate_identifier};
use lazy_regex::regex_captures;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

pub struct SchemaIntrospector {
    runner: Arc<dyn QueryRunner>,
    catalog: Box<dyn CatalogQueries>,
}

impl SchemaIntrospector {
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        let catalog = catalog_for(runner.database_type());
        Self::with_catalog(runner, catalog)
    }

    pub fn with_catalog(runner: Arc<dyn QueryRunner>, catalog: Box<dyn CatalogQueries>) -> Self {
        Self { runner, catalog }
    }

    /// Tables, views and materialized views in `schema`, sorted by name.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<TableDescriptor>, DatabaseError> {
        let (sql, params) = self.catalog.tables_query(schema);
        let rows = self.runner.fetch(&sql, &params, None).await?;

        let mut tables: Vec<TableDescriptor> = rows
            .records()
            .filter_map(|record| {
                let name = record.text("table_name")?;
                Some(TableDescriptor {
                    name,
                    kind: record
                        .text("table_type")
                        .map_or(TableKind::BaseTable, |t| TableKind::from_catalog(&t)),
                    description: non_empty(record.text("table_description")),
                })
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        log::debug!("Listed {} tables in schema '{}'", tables.len(), schema);
        Ok(tables)
    }

    /// Describe each requested table
    ///
    /// A missing table or a failing catalog query is recorded in
    /// [`TableSchemasReport::errors`] and the remaining tables are still
    /// described. Repeated names are described once.
    pub async fn table_schemas(&self, tables: &[String], schema: &str) -> TableSchemasReport {
        let mut report = TableSchemasReport::default();
        let mut seen = HashSet::new();

        for table in tables {
            if !seen.insert(table.as_str()) {
                continue;
            }
            match self.table_schema(table, schema).await {
                Ok(described) => report.tables.push(described),
                Err(DatabaseError::NotFound(message)) => report.errors.push(TableLookupError {
                    table: table.clone(),
                    kind: LookupErrorKind::NotFound,
                    message,
                }),
                Err(e) => {
                    log::warn!("Schema lookup for '{}' failed: {}", table, e);
                    report.errors.push(TableLookupError {
                        table: table.clone(),
                        kind: LookupErrorKind::ExecutionError,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Describe one table; `NotFound` when the catalog has no columns for it.
    pub async fn table_schema(&self, table: &str, schema: &str) -> Result<TableSchema, DatabaseError> {
        let (sql, params) = self.catalog.columns_query(schema, table);
        let rows = self.runner.fetch(&sql, &params, None).await?;

        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!(
                "Table '{}' not found in schema '{}'",
                table, schema
            )));
        }

        Ok(TableSchema {
            name: table.to_string(),
            schema: self.catalog.effective_schema(schema),
            description: rows
                .records()
                .find_map(|r| non_empty(r.text("table_description"))),
            columns: columns_from_rows(&rows),
        })
    }

    /// Up to `limit` rows of `schema.table`
    ///
    /// # Errors
    /// - `ExecutionError` for an identifier that fails validation
    /// - `NotFound` when the table is not in `schema`
    pub async fn sample_rows(
        &self,
        table: &str,
        schema: &str,
        limit: usize,
    ) -> Result<QueryRows, DatabaseError> {
        validate_identifier(table)?;
        validate_identifier(schema)?;

        let exists = self
            .list_tables(schema)
            .await?
            .iter()
            .any(|t| t.name == table);
        if !exists {
            return Err(DatabaseError::NotFound(format!(
                "Table '{}' not found in schema '{}'",
                table, schema
            )));
        }

        let db_type = self.runner.database_type();
        // "public" stands for the connection's default database outside PostgreSQL
        let target = if db_type != DatabaseType::Postgres && schema == DEFAULT_SCHEMA {
            quote_identifier(table, db_type)
        } else {
            format!(
                "{}.{}",
                quote_identifier(schema, db_type),
                quote_identifier(table, db_type)
            )
        };
        let sql = format!("SELECT * FROM {} LIMIT {}", target, limit);
        self.runner.fetch(&sql, &[], Some(limit)).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `varchar(255)` style declarations carry their length in the type name.
fn declared_length(data_type: &str) -> Option<i64> {
    regex_captures!(r"(?i)(?:char|varchar|character varying|character|nvarchar|nchar)\s*\(\s*(\d+)\s*\)", data_type)
        .and_then(|(_, length)| length.parse().ok())
}

fn column_from_record(record: &Record<'_>, name: String) -> ColumnDescriptor {
    let data_type = record.text("data_type").unwrap_or_default();
    let max_length = record
        .int("max_length")
        .or_else(|| declared_length(&data_type));
    let foreign_key = match (
        record.text("fk_table"),
        record.text("fk_column"),
    ) {
        (Some(table), Some(column)) => Some(ForeignKeyRef {
            schema: record.text("fk_schema").unwrap_or_default(),
            table,
            column,
        }),
        _ => None,
    };

    ColumnDescriptor {
        name,
        max_length,
        nullable: record
            .text("is_nullable")
            .is_none_or(|v| v.eq_ignore_ascii_case("YES")),
        default: record.text("column_default"),
        description: non_empty(record.text("column_description")),
        foreign_key,
        data_type,
    }
}

/// One descriptor per column; extra rows for the same column are ignored.
fn columns_from_rows(rows: &QueryRows) -> Vec<ColumnDescriptor> {
    let mut seen = HashSet::new();
    rows.records()
        .filter_map(|record| {
            let name = record.text("column_name")?;
            seen.insert(name.clone())
                .then(|| column_from_record(&record, name))
        })
        .collect()
}
