//! Statement classification
//!
//! [`Classifier::classify`] is a pure function of the statement text, the
//! [`AccessPolicy`] and the dialect used for tokenizing. It folds over
//! [`all_patterns`] in declaration order and reports the first rule the
//! policy enforces. Under a read-only policy a statement no rule names is
//! still refused unless its leading verb is a read verb.
//!
//! # Examples
//! ```
//! use sql_gateway::classifier::{Verdict, classify};
//! use sql_gateway::policy::AccessPolicy;
//!
//! let read_only = AccessPolicy::read_only();
//! assert_eq!(classify("SELECT * FROM users", &read_only), Verdict::Allowed);
//! assert!(matches!(
//!     classify("DROP TABLE users", &read_only),
//!     Verdict::DeniedMutation { ref keyword } if keyword == "DROP"
//! ));
//! ```

use crate::patterns::{Pattern, Severity, Tier, all_patterns};
use crate::policy::AccessPolicy;
use crate::sql_parser::ScannedStatement;
use crate::types::DatabaseType;

/// Outcome of classifying one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Structural injection shape, refused under every policy
    DeniedInjection { pattern_id: String, reason: String },
    /// Mutating keyword refused by a read-only policy
    DeniedMutation { keyword: String },
    /// Dangerous function or construct, refused under every policy
    DeniedPattern { pattern_id: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Short machine-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::DeniedInjection { .. } => "denied_injection",
            Self::DeniedMutation { .. } => "denied_mutation",
            Self::DeniedPattern { .. } => "denied_pattern",
        }
    }

    fn from_pattern(pattern: &Pattern, matched: String) -> Self {
        match (pattern.tier, pattern.severity) {
            (Tier::ReadOnly, _) => Self::DeniedMutation { keyword: matched },
            (Tier::AlwaysBlocked, Severity::StructuralInjection) => Self::DeniedInjection {
                pattern_id: pattern.id.to_string(),
                reason: pattern.summary.to_string(),
            },
            (Tier::AlwaysBlocked, _) => Self::DeniedPattern {
                pattern_id: pattern.id.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::DeniedInjection { pattern_id, reason } => {
                write!(f, "possible SQL injection ({}): {}", pattern_id, reason)
            }
            Self::DeniedMutation { keyword } => {
                write!(f, "{} is not allowed in read-only mode", keyword)
            }
            Self::DeniedPattern { pattern_id } => {
                write!(f, "statement uses a blocked construct ({})", pattern_id)
            }
        }
    }
}

/// Policy-aware statement classifier
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    policy: AccessPolicy,
    db_type: DatabaseType,
}

impl Classifier {
    pub fn new(policy: AccessPolicy, db_type: DatabaseType) -> Self {
        Self { policy, db_type }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Classify one statement. Never fails.
    pub fn classify(&self, statement: &str) -> Verdict {
        let scanned = ScannedStatement::scan(statement, self.db_type);
        all_patterns()
            .iter()
            .filter(|pattern| self.policy.blocks(pattern))
            .find_map(|pattern| {
                pattern
                    .matcher
                    .find(&scanned)
                    .map(|matched| Verdict::from_pattern(pattern, matched))
            })
            .or_else(|| self.unlisted_verb(&scanned))
            .unwrap_or(Verdict::Allowed)
    }

    fn unlisted_verb(&self, scanned: &ScannedStatement) -> Option<Verdict> {
        let verb = scanned.leading_word()?;
        (!self.policy.permits_verb(verb)).then(|| Verdict::DeniedMutation {
            keyword: verb.to_string(),
        })
    }
}

/// Classify with PostgreSQL tokenizing rules.
pub fn classify(statement: &str, policy: &AccessPolicy) -> Verdict {
    Classifier::new(*policy, DatabaseType::Postgres).classify(statement)
}
