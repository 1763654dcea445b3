//! MCP surface: `execute_sql`, `get_tables`, `get_table_schemas` and the
//! `postgresql://{table_name}/data` sample-rows resource

use crate::error::DatabaseError;
use crate::format::{render_result, render_rows};
use crate::gateway::ExecutionGateway;
use crate::introspect::{DEFAULT_SAMPLE_ROWS, DEFAULT_SCHEMA, SchemaIntrospector};
use lazy_regex::regex_captures;
use rmcp::{
    ErrorData as McpError, RoleServer,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ListResourceTemplatesResult,
        PaginatedRequestParam, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

pub const RESOURCE_URI_TEMPLATE: &str = "postgresql://{table_name}/data";

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

/// Parameters for execute_sql
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteSqlArgs {
    /// A single SQL statement
    pub query: String,
}

/// Parameters for get_tables
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTablesArgs {
    /// Schema to list (default "public")
    #[serde(default = "default_schema")]
    pub schema_name: String,
}

/// Parameters for get_table_schemas
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTableSchemasArgs {
    /// Table names to describe
    pub tables: Vec<String>,
    /// Schema the tables live in (default "public")
    #[serde(default = "default_schema")]
    pub schema_name: String,
}

#[derive(Clone)]
pub struct GatewayServer {
    gateway: Arc<ExecutionGateway>,
    introspector: Arc<SchemaIntrospector>,
    sample_rows: usize,
    tool_router: ToolRouter<Self>,
}

/// Caller mistakes become tool errors the agent can read; server faults stay protocol errors.
fn tool_failure(err: DatabaseError) -> Result<CallToolResult, McpError> {
    if err.is_caller_visible() {
        Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
    } else {
        Err(err.into())
    }
}

fn json_success<T: serde::Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Split `postgresql://[schema.]table/data` into schema and table.
pub fn parse_resource_uri(uri: &str) -> Option<(String, String)> {
    let (_, target) = regex_captures!(r"^postgresql://([^/]+)/data$", uri)?;
    match target.split_once('.') {
        Some((schema, table)) => Some((schema.to_string(), table.to_string())),
        None => Some((DEFAULT_SCHEMA.to_string(), target.to_string())),
    }
}

impl GatewayServer {
    pub fn new(gateway: Arc<ExecutionGateway>, introspector: Arc<SchemaIntrospector>) -> Self {
        Self {
            gateway,
            introspector,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            tool_router: Self::tool_router(),
        }
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Serve the sample-rows resource for `uri`.
    pub async fn read_table_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let (schema, table) = parse_resource_uri(uri).ok_or_else(|| {
            McpError::resource_not_found(
                format!("Unknown resource '{}'", uri),
                Some(serde_json::json!({ "uri": uri })),
            )
        })?;

        let rows = self
            .introspector
            .sample_rows(&table, &schema, self.sample_rows)
            .await
            .map_err(|e| match e {
                DatabaseError::ExecutionError(msg) => McpError::invalid_params(msg, None),
                other => McpError::from(other),
            })?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(render_rows(&rows), uri)],
        })
    }
}

#[tool_router]
impl GatewayServer {
    #[tool(description = "Execute a single SQL statement. Statements are screened first: \
        injection patterns are always refused and, in read-only mode, statements that modify \
        data, schema or privileges are refused. Reads return comma-delimited text with a \
        header row; writes return the affected row count.")]
    async fn execute_sql(
        &self,
        Parameters(args): Parameters<ExecuteSqlArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.gateway.execute(&args.query).await {
            Ok(result) => Ok(CallToolResult::success(vec![Content::text(render_result(&result))])),
            Err(e) => tool_failure(e),
        }
    }

    #[tool(description = "List tables, views and materialized views in a schema with their \
        type and description.")]
    async fn get_tables(
        &self,
        Parameters(args): Parameters<GetTablesArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.introspector.list_tables(&args.schema_name).await {
            Ok(tables) => json_success(&tables),
            Err(e) => tool_failure(e),
        }
    }

    #[tool(description = "Describe columns of the given tables: type, max length, nullability, \
        default, description and foreign key target. Tables that do not exist are reported \
        under errors without failing the others.")]
    async fn get_table_schemas(
        &self,
        Parameters(args): Parameters<GetTableSchemasArgs>,
    ) -> Result<CallToolResult, McpError> {
        let report = self
            .introspector
            .table_schemas(&args.tables, &args.schema_name)
            .await;
        json_success(&report)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        let mode = if self.gateway.policy().is_read_only() {
            "read-only"
        } else {
            "read-write"
        };
        ServerInfo {
            instructions: Some(format!(
                "Guarded SQL gateway for {} in {} mode. Use get_tables and get_table_schemas \
                 to discover the schema, execute_sql to run one statement at a time, and read \
                 {} for sample rows.",
                self.gateway.database_type(),
                mode,
                RESOURCE_URI_TEMPLATE
            )),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let template: ResourceTemplate = serde_json::from_value(serde_json::json!({
            "uriTemplate": RESOURCE_URI_TEMPLATE,
            "name": "table_sample",
            "description": format!("Up to {} rows of a table, as comma-delimited text", self.sample_rows),
            "mimeType": "text/csv",
        }))
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(ListResourceTemplatesResult::with_all_items(vec![template]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_table_resource(&request.uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::QueryRunner;
    use crate::policy::AccessPolicy;
    use crate::types::{DatabaseType, QueryRows, SqlValue};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers catalog lookups for a single `users` table and records every statement.
    #[derive(Default)]
    struct ScriptedRunner {
        statements: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryRunner for ScriptedRunner {
        fn database_type(&self) -> DatabaseType {
            DatabaseType::Postgres
        }

        async fn fetch(
            &self,
            sql: &str,
            params: &[String],
            _max_rows: Option<usize>,
        ) -> Result<QueryRows, DatabaseError> {
            if let Ok(mut statements) = self.statements.lock() {
                statements.push(sql.to_string());
            }
            let text = |s: &str| SqlValue::Text(s.to_string());
            if sql.contains("relkind") && params.len() == 1 {
                return Ok(QueryRows {
                    columns: vec!["table_name".into(), "table_type".into(), "table_description".into()],
                    rows: vec![vec![text("users"), text("BASE TABLE"), SqlValue::Null]],
                });
            }
            if sql.starts_with("SELECT * FROM") {
                return Ok(QueryRows {
                    columns: vec!["id".into()],
                    rows: vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
                });
            }
            Ok(QueryRows::default())
        }

        async fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
            if let Ok(mut statements) = self.statements.lock() {
                statements.push(sql.to_string());
            }
            Ok(0)
        }
    }

    fn server(policy: AccessPolicy) -> (GatewayServer, Arc<ScriptedRunner>) {
        let runner = Arc::new(ScriptedRunner::default());
        let gateway = Arc::new(ExecutionGateway::new(policy, runner.clone()));
        let introspector = Arc::new(SchemaIntrospector::new(runner.clone()));
        (GatewayServer::new(gateway, introspector), runner)
    }

    fn first_text(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_resource_uri() {
        assert_eq!(
            parse_resource_uri("postgresql://users/data"),
            Some(("public".to_string(), "users".to_string()))
        );
        assert_eq!(
            parse_resource_uri("postgresql://sales.orders/data"),
            Some(("sales".to_string(), "orders".to_string()))
        );
        assert_eq!(parse_resource_uri("postgresql://users/rows"), None);
        assert_eq!(parse_resource_uri("mysql://users/data"), None);
    }

    #[test]
    fn test_args_default_schema() {
        let args: Result<GetTableSchemasArgs, _> =
            serde_json::from_value(serde_json::json!({ "tables": ["users"] }));
        assert!(matches!(args, Ok(ref a) if a.schema_name == "public"));
    }

    #[tokio::test]
    async fn test_denied_statement_is_tool_error() {
        let (server, runner) = server(AccessPolicy::read_only());
        let result = server
            .execute_sql(Parameters(ExecuteSqlArgs {
                query: "DROP TABLE users".to_string(),
            }))
            .await;
        assert!(result.is_ok(), "execute_sql failed: {:?}", result.err());
        if let Ok(result) = result {
            assert_eq!(result.is_error, Some(true));
            assert!(first_text(&result).contains("DROP"));
        }
        assert!(runner.statements.lock().map(|s| s.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_write_reports_affected_rows() {
        let (server, _) = server(AccessPolicy::read_write());
        let result = server
            .execute_sql(Parameters(ExecuteSqlArgs {
                query: "UPDATE users SET active = false WHERE id = 7".to_string(),
            }))
            .await;
        assert!(result.is_ok(), "execute_sql failed: {:?}", result.err());
        if let Ok(result) = result {
            assert_eq!(first_text(&result), "Query executed successfully. Rows affected: 0");
        }
    }

    #[tokio::test]
    async fn test_resource_reads_quoted_fixed_select() {
        let (server, runner) = server(AccessPolicy::read_only());
        let result = server.read_table_resource("postgresql://users/data").await;
        assert!(result.is_ok(), "read_table_resource failed: {:?}", result.err());
        let statements = runner.statements.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(
            statements.last().map(String::as_str),
            Some("SELECT * FROM \"public\".\"users\" LIMIT 100")
        );
    }

    #[tokio::test]
    async fn test_resource_rejects_bad_identifier_and_missing_table() {
        let (server, runner) = server(AccessPolicy::read_only());
        let bad = server
            .read_table_resource("postgresql://users;drop/data")
            .await;
        assert!(bad.is_err());
        assert!(runner.statements.lock().map(|s| s.is_empty()).unwrap_or(false));

        let missing = server.read_table_resource("postgresql://ghosts/data").await;
        assert!(missing.is_err());
    }
}
