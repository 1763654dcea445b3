//! Type definitions shared by the gateway, the introspector and the tool surface

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Database type for SQL dialect-specific handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    Postgres,
    MySQL,
    MariaDB,
    SQLite,
}

impl DatabaseType {
    /// Detect database type from connection URL scheme
    ///
    /// # Examples
    /// ```
    /// # use sql_gateway::types::DatabaseType;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = DatabaseType::from_url("postgres://localhost/mydb")?;
    /// assert_eq!(db, DatabaseType::Postgres);
    /// assert_eq!(DatabaseType::from_url("sqlite::memory:")?, DatabaseType::SQLite);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &str) -> Result<Self, crate::error::DatabaseError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if url.starts_with("mysql://") {
            Ok(Self::MySQL)
        } else if url.starts_with("mariadb://") {
            Ok(Self::MariaDB)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Ok(Self::SQLite)
        } else {
            Err(crate::error::DatabaseError::ConfigurationError(format!(
                "Cannot determine database type from URL: {}",
                url
            )))
        }
    }

    /// MySQL and MariaDB share catalogs and quoting rules.
    pub fn is_mysql_family(self) -> bool {
        matches!(self, Self::MySQL | Self::MariaDB)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySQL => write!(f, "MySQL"),
            Self::MariaDB => write!(f, "MariaDB"),
            Self::SQLite => write!(f, "SQLite"),
        }
    }
}

/// A single decoded cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Text view of the cell, `None` for NULL.
    ///
    /// Integers and floats are rendered so catalog queries that come back
    /// numeric on one engine and textual on another read the same.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Float(f) => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Ordered rows with named columns, as returned by a read statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Iterate rows as name-addressable records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record { rows: self, values })
    }
}

/// Borrowed view of one row, addressed by column name
pub struct Record<'a> {
    rows: &'a QueryRows,
    values: &'a [SqlValue],
}

impl Record<'_> {
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.rows
            .column_index(name)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(SqlValue::as_text)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }
}

/// Outcome of an executed statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Read statement: ordered rows with a header
    Rows(QueryRows),
    /// Write statement: affected row count only
    Affected(u64),
}

/// Kind of relation reported by `get_tables`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TableKind {
    #[serde(rename = "BASE TABLE")]
    BaseTable,
    #[serde(rename = "VIEW")]
    View,
    #[serde(rename = "MATERIALIZED VIEW")]
    MaterializedView,
}

impl TableKind {
    /// Map a catalog `table_type` string. Unknown kinds are treated as base tables.
    pub fn from_catalog(value: &str) -> Self {
        let upper = value.trim().to_ascii_uppercase();
        if upper.contains("MATERIALIZED") {
            Self::MaterializedView
        } else if upper.contains("VIEW") {
            Self::View
        } else {
            Self::BaseTable
        }
    }
}

/// Database table listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,

    /// Relation kind
    #[serde(rename = "type")]
    pub kind: TableKind,

    /// Comment attached to the relation, if any
    pub description: Option<String>,
}

/// Target of a foreign-key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// Database table column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Data type as reported by the catalog (e.g. "character varying", "INTEGER")
    #[serde(rename = "type")]
    pub data_type: String,

    /// Declared character length for sized text types
    pub max_length: Option<i64>,

    /// Whether the column accepts NULL
    pub nullable: bool,

    /// Default value expression
    pub default: Option<String>,

    /// Column comment
    pub description: Option<String>,

    /// Referenced column, when a foreign key constraint exists
    pub foreign_key: Option<ForeignKeyRef>,
}

/// Full column listing for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub name: String,
    pub schema: String,
    pub description: Option<String>,
    /// Columns in catalog ordinal order
    pub columns: Vec<ColumnDescriptor>,
}

/// Why a requested table could not be described
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LookupErrorKind {
    NotFound,
    ExecutionError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableLookupError {
    pub table: String,
    pub kind: LookupErrorKind,
    pub message: String,
}

/// Partial-success result of a multi-table schema lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchemasReport {
    pub tables: Vec<TableSchema>,
    pub errors: Vec<TableLookupError>,
}
