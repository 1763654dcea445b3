//! Execution gateway: classify, then execute, for caller-supplied SQL
//!
//! The database is never contacted for a statement the classifier refuses.
//! Every call, allowed or not, produces one [`AuditRecord`].

use crate::audit::{AuditOutcome, AuditRecord};
use crate::classifier::{Classifier, Verdict};
use crate::connection::QueryRunner;
use crate::error::DatabaseError;
use crate::policy::{AccessPolicy, is_read_keyword};
use crate::sql_limiter::apply_row_limit;
use crate::sql_parser::extract_first_keyword;
use crate::types::{DatabaseType, QueryResult};
use std::sync::Arc;
use std::time::Instant;

pub struct ExecutionGateway {
    classifier: Classifier,
    runner: Arc<dyn QueryRunner>,
    max_rows: Option<usize>,
}

impl ExecutionGateway {
    pub fn new(policy: AccessPolicy, runner: Arc<dyn QueryRunner>) -> Self {
        let classifier = Classifier::new(policy, runner.database_type());
        Self {
            classifier,
            runner,
            max_rows: None,
        }
    }

    /// Cap rows returned by read statements. The runner stops reading at the cap.
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows.filter(|n| *n > 0);
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        self.classifier.policy()
    }

    pub fn database_type(&self) -> DatabaseType {
        self.classifier.database_type()
    }

    /// Classify without executing.
    pub fn classify(&self, statement: &str) -> Verdict {
        self.classifier.classify(statement)
    }

    /// Classify `statement` and run it if allowed
    ///
    /// # Errors
    /// - `PolicyViolation` when the classifier refuses the statement
    /// - `ExecutionError` for an empty statement or a database failure
    pub async fn execute(&self, statement: &str) -> Result<QueryResult, DatabaseError> {
        let started = Instant::now();
        let verdict = self.classifier.classify(statement);

        if !verdict.is_allowed() {
            log::warn!("Statement refused: {}", verdict);
            self.audit(statement, &verdict, AuditOutcome::Denied, started);
            return Err(DatabaseError::PolicyViolation(verdict));
        }

        let result = self.run(statement).await;

        let outcome = match &result {
            Ok(QueryResult::Rows(rows)) => AuditOutcome::Rows { count: rows.len() },
            Ok(QueryResult::Affected(count)) => AuditOutcome::Affected { count: *count },
            Err(e) => AuditOutcome::Failed {
                error: e.to_string(),
            },
        };
        self.audit(statement, &verdict, outcome, started);

        result
    }

    async fn run(&self, statement: &str) -> Result<QueryResult, DatabaseError> {
        let db_type = self.database_type();
        let keyword = extract_first_keyword(statement, db_type)?;

        if !is_read_keyword(&keyword) {
            log::debug!("Executing {} statement", keyword);
            let affected = self.runner.execute(statement).await?;
            return Ok(QueryResult::Affected(affected));
        }

        let sql = match self.max_rows {
            Some(max_rows) => apply_row_limit(statement, max_rows, db_type)?,
            None => statement.to_string(),
        };
        let mut rows = self.runner.fetch(&sql, &[], self.max_rows).await?;
        if let Some(max_rows) = self.max_rows
            && rows.rows.len() > max_rows
        {
            rows.rows.truncate(max_rows);
        }
        Ok(QueryResult::Rows(rows))
    }

    fn audit(&self, statement: &str, verdict: &Verdict, outcome: AuditOutcome, started: Instant) {
        AuditRecord::new(
            statement,
            self.policy().mode(),
            verdict,
            outcome,
            started.elapsed(),
        )
        .emit();
    }
}
