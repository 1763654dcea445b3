//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sql_gateway::{
    DatabaseError, DatabaseType, GatewayConfig, PoolRunner, QueryRows, setup_database_pool,
};
use sqlx::AnyPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Single-connection in-memory SQLite pool; every statement sees the same database.
pub async fn sqlite_pool() -> Arc<AnyPool> {
    let config = GatewayConfig::from_lookup(|key| match key {
        "DATABASE_DSN" => Some("sqlite::memory:".to_string()),
        "DB_MAX_CONNECTIONS" => Some("1".to_string()),
        "DB_MIN_CONNECTIONS" => Some("1".to_string()),
        _ => None,
    })
    .expect("sqlite config");
    setup_database_pool(&config).await.expect("sqlite pool")
}

pub async fn run_ddl(pool: &AnyPool, statements: &[&str]) {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", statement, e));
    }
}

pub fn sqlite_runner(pool: Arc<AnyPool>) -> Arc<PoolRunner> {
    Arc::new(PoolRunner::new(pool, DatabaseType::SQLite, Duration::from_secs(5)))
}

/// Runner that records every call and answers with empty results
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<String>>,
    /// Row cap passed with each fetch
    pub caps: Mutex<Vec<Option<usize>>>,
}

impl RecordingRunner {
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(usize::MAX)
    }

    fn record(&self, sql: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(sql.to_string());
        }
    }
}

#[async_trait]
impl sql_gateway::QueryRunner for RecordingRunner {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn fetch(
        &self,
        sql: &str,
        _params: &[String],
        max_rows: Option<usize>,
    ) -> Result<QueryRows, DatabaseError> {
        self.record(sql);
        if let Ok(mut caps) = self.caps.lock() {
            caps.push(max_rows);
        }
        Ok(QueryRows::default())
    }

    async fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        self.record(sql);
        Ok(3)
    }
}
