// SQL gateway MCP server
//
// Serves execute_sql, get_tables and get_table_schemas plus the
// postgresql://{table_name}/data resource over stdio.
//
// REQUIRED: DATABASE_DSN, DB_SECRET_FILE, or the PG_* variables.
// OPTIONAL: READ_ONLY_CONNECTION (default true), DEBUG, MAX_ROWS, SAMPLE_ROWS,
//           DB_*_TIMEOUT_SECS, DB_MIN_CONNECTIONS, DB_MAX_CONNECTIONS.

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use sql_gateway::{
    ExecutionGateway, GatewayConfig, GatewayServer, PoolRunner, SchemaIntrospector,
    setup_database_pool,
};
use std::sync::Arc;

/// Logs go to stderr; stdout carries the MCP stream.
fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env().context("Invalid configuration")?;
    init_logging(config.debug);

    log::info!(
        "Starting SQL gateway ({}, {})",
        config.database_type,
        config.access_policy().mode().as_str()
    );

    let pool = setup_database_pool(&config).await?;

    let runner = PoolRunner::new(pool, config.database_type, config.query_timeout);
    let metadata_runner = runner.with_timeout(config.metadata_timeout);

    let gateway = ExecutionGateway::new(config.access_policy(), Arc::new(runner))
        .with_max_rows(config.max_rows);
    let introspector = SchemaIntrospector::new(Arc::new(metadata_runner));

    let server = GatewayServer::new(Arc::new(gateway), Arc::new(introspector))
        .with_sample_rows(config.sample_rows);

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP stdio transport")?;

    log::info!("Serving on stdio");
    service.waiting().await?;

    log::info!("Shutting down");
    Ok(())
}
