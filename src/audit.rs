//! One structured audit record per gateway call
//!
//! Records are written to the `audit` log target as single-line JSON. The
//! statement text itself is never logged, only its SHA-256.

use crate::classifier::Verdict;
use crate::policy::AccessMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const AUDIT_TARGET: &str = "audit";

/// What happened to the statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Refused by the classifier; the database was not contacted
    Denied,
    Rows { count: usize },
    Affected { count: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub occurred_at: DateTime<Utc>,
    pub statement_hash: String,
    pub mode: &'static str,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
}

/// Hex SHA-256 of the statement text as received.
pub fn statement_hash(statement: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl AuditRecord {
    pub fn new(
        statement: &str,
        mode: AccessMode,
        verdict: &Verdict,
        outcome: AuditOutcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            occurred_at: Utc::now(),
            statement_hash: statement_hash(statement),
            mode: mode.as_str(),
            verdict: verdict.label(),
            detail: (!verdict.is_allowed()).then(|| verdict.to_string()),
            outcome,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Write the record to the audit log target. Best effort, never fails the call.
    pub fn emit(&self) {
        match self.to_json() {
            Ok(line) => log::info!(target: AUDIT_TARGET, "{}", line),
            Err(e) => log::warn!(target: AUDIT_TARGET, "Failed to serialize audit record: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = statement_hash("SELECT 1");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, statement_hash("SELECT 1"));
        assert_ne!(hash, statement_hash("SELECT 2"));
    }

    #[test]
    fn test_denied_record_json() {
        let verdict = Verdict::DeniedMutation {
            keyword: "DROP".to_string(),
        };
        let record = AuditRecord::new(
            "DROP TABLE users",
            AccessMode::ReadOnly,
            &verdict,
            AuditOutcome::Denied,
            Duration::from_millis(3),
        );
        let json = record
            .to_json()
            .ok()
            .and_then(|line| serde_json::from_str::<serde_json::Value>(&line).ok());
        assert!(json.is_some());
        if let Some(json) = json {
            assert_eq!(json["verdict"], "denied_mutation");
            assert_eq!(json["mode"], "read_only");
            assert_eq!(json["outcome"]["status"], "denied");
            assert_eq!(json["duration_ms"], 3);
            assert_eq!(json["statement_hash"], statement_hash("DROP TABLE users"));
            assert!(!json.to_string().contains("DROP TABLE users"));
        }
    }

    #[test]
    fn test_allowed_record_has_no_detail() {
        let record = AuditRecord::new(
            "SELECT 1",
            AccessMode::ReadWrite,
            &Verdict::Allowed,
            AuditOutcome::Rows { count: 1 },
            Duration::ZERO,
        );
        assert!(record.detail.is_none());
        assert_eq!(record.outcome, AuditOutcome::Rows { count: 1 });
    }
}
