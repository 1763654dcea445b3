//! Database connection: pool setup and the query seam the gateway runs through
//!
//! [`QueryRunner`] is the only way the gateway and the introspector reach the
//! database. [`PoolRunner`] implements it over a sqlx `AnyPool`; tests swap in
//! recording doubles.

use crate::config::GatewayConfig;
use crate::error::DatabaseError;
use crate::row_converter::rows_to_result;
use crate::timeout::execute_with_timeout;
use crate::types::{DatabaseType, QueryRows};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use secrecy::ExposeSecret;
use sqlx::AnyPool;
use sqlx::pool::PoolOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Statement execution against one database
#[async_trait]
pub trait QueryRunner: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Run a row-returning statement. `params` bind positionally as text;
    /// at most `max_rows` rows are read when a cap is given.
    async fn fetch(
        &self,
        sql: &str,
        params: &[String],
        max_rows: Option<usize>,
    ) -> Result<QueryRows, DatabaseError>;

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64, DatabaseError>;
}

/// [`QueryRunner`] over a shared sqlx pool with a fixed per-statement timeout
#[derive(Clone)]
pub struct PoolRunner {
    pool: Arc<AnyPool>,
    db_type: DatabaseType,
    statement_timeout: Duration,
}

impl PoolRunner {
    pub fn new(pool: Arc<AnyPool>, db_type: DatabaseType, statement_timeout: Duration) -> Self {
        Self {
            pool,
            db_type,
            statement_timeout,
        }
    }

    /// Same pool, different timeout.
    pub fn with_timeout(&self, statement_timeout: Duration) -> Self {
        Self {
            statement_timeout,
            ..self.clone()
        }
    }

    pub fn pool(&self) -> &Arc<AnyPool> {
        &self.pool
    }
}

#[async_trait]
impl QueryRunner for PoolRunner {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn fetch(
        &self,
        sql: &str,
        params: &[String],
        max_rows: Option<usize>,
    ) -> Result<QueryRows, DatabaseError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        // Rows past the cap are never pulled off the wire
        let rows = execute_with_timeout(
            self.statement_timeout,
            async {
                let stream = query.fetch(&*self.pool);
                match max_rows {
                    Some(limit) => stream.take(limit).try_collect::<Vec<_>>().await,
                    None => stream.try_collect::<Vec<_>>().await,
                }
            },
            "Query failed",
        )
        .await?;
        rows_to_result(&rows)
    }

    async fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        let result = execute_with_timeout(
            self.statement_timeout,
            sqlx::query(sql).execute(&*self.pool),
            "Statement failed",
        )
        .await?;
        Ok(result.rows_affected())
    }
}

/// Open `min_connections` pooled connections before serving
///
/// # Errors
/// Fails when none of the connections could be opened
pub async fn warmup_pool(pool: &AnyPool, min_connections: u32) -> Result<()> {
    if min_connections == 0 {
        return Ok(());
    }

    let started = Instant::now();
    let mut pings = JoinSet::new();
    for _ in 0..min_connections {
        let pool = pool.clone();
        pings.spawn(async move { sqlx::query("SELECT 1").execute(&pool).await });
    }

    let mut open = 0u32;
    while let Some(joined) = pings.join_next().await {
        match joined {
            Ok(Ok(_)) => open += 1,
            Ok(Err(e)) => log::warn!("Connection ping failed: {}", e),
            Err(e) => log::warn!("Connection ping task ended abnormally: {}", e),
        }
    }

    if open == 0 {
        anyhow::bail!("Could not open any of {} database connections", min_connections);
    }
    log::debug!(
        "{} of {} database connections open after {:?}",
        open,
        min_connections,
        started.elapsed()
    );
    Ok(())
}

/// Build the connection pool from configuration and warm it up
///
/// # Errors
/// Returns error if the database is unreachable or warmup fails
pub async fn setup_database_pool(config: &GatewayConfig) -> Result<Arc<AnyPool>> {
    // Registers the compiled-in drivers; must precede any AnyPool use
    sqlx::any::install_default_drivers();

    let pool = PoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(Duration::from_secs(600)))
        .max_lifetime(Some(Duration::from_secs(1800)))
        .test_before_acquire(true)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SELECT 1").fetch_one(conn).await?;
                Ok(())
            })
        })
        .connect(config.dsn.expose_secret())
        .await
        .with_context(|| format!("Failed to connect to database at {}", config.safe_dsn))?;

    warmup_pool(&pool, config.min_connections).await?;

    log::info!(
        "✓ Database connected ({}, {})",
        config.database_type,
        config.safe_dsn
    );

    Ok(Arc::new(pool))
}
