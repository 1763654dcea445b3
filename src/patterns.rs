//! Ordered detection rules consulted by the statement classifier
//!
//! Rules are data: each [`Pattern`] carries an id, a severity, the policy
//! tier it belongs to and a [`Matcher`] evaluated against a
//! [`ScannedStatement`](crate::sql_parser::ScannedStatement). The classifier
//! walks [`all_patterns`] in declaration order and the first hit wins, so
//! multi-word keywords (`CREATE EXTENSION`) are declared before their
//! single-word prefixes (`CREATE`).
//!
//! Verbs that can only lead a statement (`VACUUM`, `GRANT`, `SET`) are matched
//! in leading position so columns or functions sharing the name stay usable.
//! DML and DDL verbs are matched anywhere, which also catches DML inside a CTE.

use crate::sql_parser::ScannedStatement;
use lazy_regex::{Lazy, Regex, lazy_regex};

/// How bad a match is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Injection shape: comment truncation, tautology, stacked statements, UNION exfiltration
    StructuralInjection,
    /// Statement verb that changes data, schema or privileges
    MutatingKeyword,
    /// Maintenance verbs and dangerous server-side functions
    Administrative,
    /// Installing code into the server
    ExtensionOrFunctionCreation,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StructuralInjection => "structural_injection",
            Self::MutatingKeyword => "mutating_keyword",
            Self::Administrative => "administrative",
            Self::ExtensionOrFunctionCreation => "extension_or_function_creation",
        }
    }
}

/// Which policies a pattern applies under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Blocked under every policy
    AlwaysBlocked,
    /// Blocked only when the policy is read-only
    ReadOnly,
}

/// Match strategy for a pattern
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Consecutive unquoted words anywhere, case-insensitive (`CREATE EXTENSION`)
    Keywords(&'static [&'static str]),
    /// Unquoted words that open the statement (`COMMENT ON`)
    Leading(&'static [&'static str]),
    /// Any of the named functions invoked as `name(`
    FunctionCall(&'static [&'static str]),
    /// Regex over the normalized comparison form
    Structure(&'static Lazy<Regex>),
    /// A comment outside string literals
    Comment,
    /// More than one statement in the input
    StackedStatements,
    /// SQLite `PRAGMA` that assigns a value or calls a non-inspecting pragma
    PragmaWrite,
}

impl Matcher {
    /// Returns the matched text (keyword, function name or fragment) on a hit.
    pub fn find(&self, scanned: &ScannedStatement) -> Option<String> {
        match self {
            Self::Keywords(words) => scanned.find_keyword_sequence(words).then(|| words.join(" ")),
            Self::Leading(words) => scanned.starts_with_keywords(words).then(|| words.join(" ")),
            Self::FunctionCall(names) => scanned
                .calls()
                .find(|call| names.iter().any(|name| call.eq_ignore_ascii_case(name)))
                .map(str::to_string),
            Self::Structure(regex) => regex
                .find(scanned.comparison_form())
                .map(|m| m.as_str().to_string()),
            Self::Comment => scanned.has_comment().then(|| "comment".to_string()),
            Self::StackedStatements => scanned.is_stacked().then(|| ";".to_string()),
            Self::PragmaWrite => pragma_write(scanned.comparison_form()),
        }
    }
}

/// A single classified detection rule
#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    pub id: &'static str,
    pub severity: Severity,
    pub tier: Tier,
    pub matcher: Matcher,
    /// Human readable reason reported with a denial
    pub summary: &'static str,
}

static NUMERIC_TAUTOLOGY: Lazy<Regex> =
    lazy_regex!(r"(?i)\bOR\s+(\d+(?:\.\d+)?)\s*=\s*(\d+(?:\.\d+)?)\b");
static STRING_TAUTOLOGY: Lazy<Regex> = lazy_regex!(r"(?i)\bOR\s+'[^']*'\s*=\s*'[^']*'");
static BOOLEAN_TAUTOLOGY: Lazy<Regex> = lazy_regex!(r"(?i)\bOR\s+TRUE\b");
static UNION_NULL_PADDING: Lazy<Regex> =
    lazy_regex!(r"(?i)\bUNION\s+(?:ALL\s+)?SELECT\s+NULL\b");
static UNION_CATALOG_READ: Lazy<Regex> = lazy_regex!(
    r#"(?i)\bUNION\s+(?:ALL\s+)?SELECT\b.*?\bFROM\s+["`]?(?:INFORMATION_SCHEMA|PG_CATALOG|PG_SHADOW|PG_AUTHID|PG_USER|PG_ROLES|SQLITE_MASTER|SQLITE_SCHEMA|MYSQL\s*\.\s*USER)\b"#
);
static COPY_PROGRAM: Lazy<Regex> = lazy_regex!(r"(?i)\bCOPY\b.*\bPROGRAM\b");
static PRAGMA_CALL: Lazy<Regex> =
    lazy_regex!(r"^PRAGMA\s+(?:\S+\s+\.\s+)?([A-Z0-9_]+)\s*(=|\()?");

/// Pragmas that only report; any argument selects what to inspect.
const INSPECTING_PRAGMAS: &[&str] = &[
    "TABLE_INFO",
    "TABLE_XINFO",
    "TABLE_LIST",
    "INDEX_LIST",
    "INDEX_INFO",
    "INDEX_XINFO",
    "FOREIGN_KEY_LIST",
    "FOREIGN_KEY_CHECK",
    "INTEGRITY_CHECK",
    "QUICK_CHECK",
    "DATABASE_LIST",
    "COLLATION_LIST",
    "FUNCTION_LIST",
    "MODULE_LIST",
    "PRAGMA_LIST",
    "COMPILE_OPTIONS",
];

fn pragma_write(comparison: &str) -> Option<String> {
    let caps = PRAGMA_CALL.captures(comparison)?;
    let name = caps.get(1)?.as_str();
    let writes = match caps.get(2).map(|m| m.as_str()) {
        Some("=") => true,
        Some(_) => !INSPECTING_PRAGMAS.contains(&name),
        None => false,
    };
    writes.then(|| format!("PRAGMA {}", name))
}

static PATTERNS: &[Pattern] = &[
    // Structural injection, blocked in every mode
    Pattern {
        id: "comment_truncation",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Comment,
        summary: "SQL comment can truncate the remainder of the statement",
    },
    Pattern {
        id: "stacked_statements",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::StackedStatements,
        summary: "multiple statements separated by ';'",
    },
    Pattern {
        id: "numeric_tautology",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&NUMERIC_TAUTOLOGY),
        summary: "always-true numeric comparison after OR",
    },
    Pattern {
        id: "string_tautology",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&STRING_TAUTOLOGY),
        summary: "string literal comparison after OR",
    },
    Pattern {
        id: "boolean_tautology",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&BOOLEAN_TAUTOLOGY),
        summary: "OR TRUE makes the condition always true",
    },
    Pattern {
        id: "union_null_padding",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&UNION_NULL_PADDING),
        summary: "NULL-padded UNION SELECT",
    },
    Pattern {
        id: "union_catalog_read",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&UNION_CATALOG_READ),
        summary: "UNION SELECT reading system catalogs",
    },
    Pattern {
        id: "privilege_enumeration",
        severity: Severity::StructuralInjection,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::FunctionCall(&[
            "HAS_ANY_COLUMN_PRIVILEGE",
            "HAS_COLUMN_PRIVILEGE",
            "HAS_DATABASE_PRIVILEGE",
            "HAS_FOREIGN_DATA_WRAPPER_PRIVILEGE",
            "HAS_FUNCTION_PRIVILEGE",
            "HAS_LANGUAGE_PRIVILEGE",
            "HAS_PARAMETER_PRIVILEGE",
            "HAS_SCHEMA_PRIVILEGE",
            "HAS_SEQUENCE_PRIVILEGE",
            "HAS_SERVER_PRIVILEGE",
            "HAS_TABLE_PRIVILEGE",
            "HAS_TABLESPACE_PRIVILEGE",
            "HAS_TYPE_PRIVILEGE",
            "PG_HAS_ROLE",
        ]),
        summary: "privilege probing catalog function",
    },
    // Dangerous server-side functions, blocked in every mode
    Pattern {
        id: "time_delay",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::FunctionCall(&[
            "PG_SLEEP",
            "PG_SLEEP_FOR",
            "PG_SLEEP_UNTIL",
            "SLEEP",
            "BENCHMARK",
        ]),
        summary: "time-delay function",
    },
    Pattern {
        id: "waitfor_delay",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Keywords(&["WAITFOR", "DELAY"]),
        summary: "time-delay statement",
    },
    Pattern {
        id: "file_access",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::FunctionCall(&[
            "PG_READ_FILE",
            "PG_READ_BINARY_FILE",
            "PG_LS_DIR",
            "PG_STAT_FILE",
            "LO_IMPORT",
            "LO_EXPORT",
            "LOAD_FILE",
        ]),
        summary: "server file system access",
    },
    Pattern {
        id: "into_outfile",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Keywords(&["INTO", "OUTFILE"]),
        summary: "result export to a server file",
    },
    Pattern {
        id: "into_dumpfile",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Keywords(&["INTO", "DUMPFILE"]),
        summary: "result export to a server file",
    },
    Pattern {
        id: "remote_execution",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::FunctionCall(&["DBLINK", "DBLINK_EXEC", "XP_CMDSHELL", "LOAD_EXTENSION"]),
        summary: "remote or native code execution",
    },
    Pattern {
        id: "copy_program",
        severity: Severity::Administrative,
        tier: Tier::AlwaysBlocked,
        matcher: Matcher::Structure(&COPY_PROGRAM),
        summary: "COPY through a shell program",
    },
    // Read-only tier: multi-word verbs before their single-word prefixes
    Pattern {
        id: "create_extension",
        severity: Severity::ExtensionOrFunctionCreation,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["CREATE", "EXTENSION"]),
        summary: "extension installation",
    },
    Pattern {
        id: "create_function",
        severity: Severity::ExtensionOrFunctionCreation,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["CREATE", "FUNCTION"]),
        summary: "function creation",
    },
    Pattern {
        id: "comment_on",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["COMMENT", "ON"]),
        summary: "catalog comment change",
    },
    Pattern {
        id: "security_label",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["SECURITY", "LABEL"]),
        summary: "security label change",
    },
    Pattern {
        id: "insert",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["INSERT"]),
        summary: "data modification",
    },
    Pattern {
        id: "update",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["UPDATE"]),
        summary: "data modification",
    },
    Pattern {
        id: "delete",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["DELETE"]),
        summary: "data modification",
    },
    Pattern {
        id: "merge",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["MERGE"]),
        summary: "data modification",
    },
    Pattern {
        id: "replace",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["REPLACE"]),
        summary: "data modification",
    },
    Pattern {
        id: "upsert",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["UPSERT"]),
        summary: "data modification",
    },
    // INSERT/MERGE/REPLACE INTO are reported above; what is left is SELECT ... INTO
    Pattern {
        id: "select_into",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["INTO"]),
        summary: "query result written to a new table or variable",
    },
    Pattern {
        id: "truncate",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["TRUNCATE"]),
        summary: "data modification",
    },
    Pattern {
        id: "create",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["CREATE"]),
        summary: "schema change",
    },
    Pattern {
        id: "drop",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["DROP"]),
        summary: "schema change",
    },
    Pattern {
        id: "alter",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Keywords(&["ALTER"]),
        summary: "schema change",
    },
    Pattern {
        id: "rename",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["RENAME"]),
        summary: "schema change",
    },
    Pattern {
        id: "grant",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["GRANT"]),
        summary: "privilege change",
    },
    Pattern {
        id: "revoke",
        severity: Severity::MutatingKeyword,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["REVOKE"]),
        summary: "privilege change",
    },
    Pattern {
        id: "vacuum",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["VACUUM"]),
        summary: "maintenance command",
    },
    Pattern {
        id: "analyze",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["ANALYZE"]),
        summary: "maintenance command",
    },
    Pattern {
        id: "reindex",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["REINDEX"]),
        summary: "maintenance command",
    },
    Pattern {
        id: "cluster",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["CLUSTER"]),
        summary: "maintenance command",
    },
    Pattern {
        id: "install",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["INSTALL"]),
        summary: "plugin installation",
    },
    Pattern {
        id: "copy",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["COPY"]),
        summary: "bulk import or export",
    },
    Pattern {
        id: "call",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["CALL"]),
        summary: "procedure call",
    },
    Pattern {
        id: "lock",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["LOCK"]),
        summary: "explicit table lock",
    },
    Pattern {
        id: "refresh",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["REFRESH"]),
        summary: "materialized view refresh",
    },
    Pattern {
        id: "attach",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["ATTACH"]),
        summary: "database attachment",
    },
    Pattern {
        id: "detach",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["DETACH"]),
        summary: "database attachment",
    },
    Pattern {
        id: "set",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["SET"]),
        summary: "session or role change",
    },
    Pattern {
        id: "do_block",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::Leading(&["DO"]),
        summary: "anonymous code block",
    },
    Pattern {
        id: "pragma_write",
        severity: Severity::Administrative,
        tier: Tier::ReadOnly,
        matcher: Matcher::PragmaWrite,
        summary: "SQLite pragma change",
    },
];

/// Every detection rule, in evaluation order.
pub fn all_patterns() -> &'static [Pattern] {
    PATTERNS
}

/// Look up a rule by id
pub fn find_pattern(id: &str) -> Option<&'static Pattern> {
    PATTERNS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DatabaseType;
    use std::collections::HashSet;

    fn scan(sql: &str) -> ScannedStatement {
        ScannedStatement::scan(sql, DatabaseType::Postgres)
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = all_patterns().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), all_patterns().len());
    }

    #[test]
    fn test_always_blocked_tier_precedes_read_only_tier() {
        let first_read_only = all_patterns()
            .iter()
            .position(|p| p.tier == Tier::ReadOnly)
            .unwrap_or(all_patterns().len());
        assert!(
            all_patterns()[first_read_only..]
                .iter()
                .all(|p| p.tier == Tier::ReadOnly)
        );
    }

    #[test]
    fn test_multi_word_keywords_precede_prefixes() {
        let position = |id: &str| all_patterns().iter().position(|p| p.id == id);
        assert!(position("create_extension") < position("create"));
        assert!(position("create_function") < position("create"));
    }

    #[test]
    fn test_keyword_matcher_needs_whole_words() {
        let create = find_pattern("create").map(|p| p.matcher);
        assert!(create.is_some());
        if let Some(matcher) = create {
            assert!(matcher.find(&scan("SELECT created_at FROM t")).is_none());
            assert_eq!(
                matcher.find(&scan("create table t (id int)")).as_deref(),
                Some("CREATE")
            );
        }
    }

    #[test]
    fn test_function_matcher_requires_call() {
        let sleep = find_pattern("time_delay").map(|p| p.matcher);
        assert!(sleep.is_some());
        if let Some(matcher) = sleep {
            assert!(matcher.find(&scan("SELECT sleep FROM naps")).is_none());
            assert_eq!(
                matcher.find(&scan("SELECT pg_sleep (5)")).as_deref(),
                Some("PG_SLEEP")
            );
        }
    }

    #[test]
    fn test_tautology_regexes() {
        assert!(NUMERIC_TAUTOLOGY.is_match("WHERE ID = 4 OR 1 = 1"));
        assert!(!NUMERIC_TAUTOLOGY.is_match("WHERE ID = 4 OR ID = 1"));
        assert!(STRING_TAUTOLOGY.is_match("WHERE A = '?' OR '?' = '?'"));
        assert!(BOOLEAN_TAUTOLOGY.is_match("WHERE ACTIVE OR TRUE"));
        assert!(!BOOLEAN_TAUTOLOGY.is_match("WHERE ACTIVE OR TRUENESS"));
    }

    #[test]
    fn test_leading_matcher_ignores_columns() {
        let cluster = find_pattern("cluster").map(|p| p.matcher);
        assert!(cluster.is_some());
        if let Some(matcher) = cluster {
            assert!(matcher.find(&scan("SELECT cluster, lock FROM nodes")).is_none());
            assert_eq!(matcher.find(&scan("(CLUSTER orders)")).as_deref(), Some("CLUSTER"));
        }
        let comment_on = find_pattern("comment_on").map(|p| p.matcher);
        if let Some(matcher) = comment_on {
            assert!(
                matcher
                    .find(&scan("SELECT p.id FROM posts p JOIN comment ON comment.post_id = p.id"))
                    .is_none()
            );
        }
    }

    #[test]
    fn test_pragma_write() {
        assert_eq!(
            pragma_write("PRAGMA WRITABLE_SCHEMA = ON").as_deref(),
            Some("PRAGMA WRITABLE_SCHEMA")
        );
        assert_eq!(
            pragma_write("PRAGMA JOURNAL_MODE ( WAL )").as_deref(),
            Some("PRAGMA JOURNAL_MODE")
        );
        assert!(pragma_write("PRAGMA MAIN . TABLE_INFO ( USERS )").is_none());
        assert!(pragma_write("PRAGMA FOREIGN_KEYS").is_none());
        assert!(pragma_write("SELECT 1").is_none());
    }

    #[test]
    fn test_union_catalog_read() {
        assert!(UNION_CATALOG_READ.is_match(
            "SELECT ID FROM T UNION SELECT USENAME FROM PG_SHADOW"
        ));
        assert!(UNION_CATALOG_READ.is_match(
            "SELECT 1 UNION ALL SELECT TABLE_NAME FROM INFORMATION_SCHEMA . TABLES"
        ));
        assert!(!UNION_CATALOG_READ.is_match("SELECT TABLE_NAME FROM INFORMATION_SCHEMA . TABLES"));
    }
}
