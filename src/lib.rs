//! Guarded SQL gateway for MCP agents
//!
//! Screens caller-supplied SQL against injection patterns and an access
//! policy before it reaches the database, and answers schema questions from
//! fixed catalog queries. Supports PostgreSQL, MySQL, MariaDB and SQLite.

pub mod error;
pub mod types;

// Statement screening
pub mod classifier;
pub mod patterns;
pub mod policy;
pub mod sql_parser;
pub mod validate;

// Execution
pub mod audit;
pub mod connection;
pub mod format;
pub mod gateway;
pub mod row_converter;
pub mod sql_limiter;
pub mod timeout;

// Introspection
pub mod introspect;
pub mod schema_queries;

// Startup and transport
pub mod config;
pub mod dsn;
pub mod server;

// Re-export secrecy types for consumers
pub use secrecy::{ExposeSecret, SecretString};

// Re-exports
pub use classifier::{Classifier, Verdict, classify};
pub use config::GatewayConfig;
pub use connection::{PoolRunner, QueryRunner, setup_database_pool, warmup_pool};
pub use dsn::{ConnectionSettings, mask_dsn};
pub use error::DatabaseError;
pub use gateway::ExecutionGateway;
pub use introspect::SchemaIntrospector;
pub use patterns::{Pattern, Severity, Tier, all_patterns, find_pattern};
pub use policy::{AccessMode, AccessPolicy};
pub use server::GatewayServer;
pub use sql_limiter::apply_row_limit;
pub use sql_parser::{extract_first_keyword, strip_comments};
pub use types::{
    ColumnDescriptor, DatabaseType, ForeignKeyRef, QueryResult, QueryRows, SqlValue,
    TableDescriptor, TableKind, TableSchema, TableSchemasReport,
};
pub use validate::{quote_identifier, validate_identifier};
