//! Access policy: the read-only / read-write switch the classifier consults

use crate::patterns::{Matcher, Pattern, Tier, all_patterns};

/// Statement verbs that only read
const READ_KEYWORDS: &[&str] = &[
    "select", "with", "show", "explain", "values", "table", "describe", "desc", "pragma",
];

/// `keyword` is lowercase.
pub fn is_read_keyword(keyword: &str) -> bool {
    READ_KEYWORDS.contains(&keyword)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
        }
    }
}

/// Immutable policy value, built once at startup and handed to constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    mode: AccessMode,
}

impl AccessPolicy {
    pub fn new(mode: AccessMode) -> Self {
        Self { mode }
    }

    pub fn read_only() -> Self {
        Self::new(AccessMode::ReadOnly)
    }

    pub fn read_write() -> Self {
        Self::new(AccessMode::ReadWrite)
    }

    pub fn from_read_only_flag(read_only: bool) -> Self {
        if read_only {
            Self::read_only()
        } else {
            Self::read_write()
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == AccessMode::ReadOnly
    }

    /// Whether `pattern` is enforced under this policy.
    pub fn blocks(&self, pattern: &Pattern) -> bool {
        match pattern.tier {
            Tier::AlwaysBlocked => true,
            Tier::ReadOnly => self.is_read_only(),
        }
    }

    /// Whether a statement led by `verb` may run at all. Read-only admits read verbs only.
    pub fn permits_verb(&self, verb: &str) -> bool {
        !self.is_read_only() || is_read_keyword(&verb.to_ascii_lowercase())
    }

    /// Keywords refused by this policy on top of the always-blocked rules.
    pub fn blocked_keywords(&self) -> Vec<String> {
        all_patterns()
            .iter()
            .filter(|p| p.tier == Tier::ReadOnly && self.blocks(p))
            .filter_map(|p| match p.matcher {
                Matcher::Keywords(words) | Matcher::Leading(words) => Some(words.join(" ")),
                _ => None,
            })
            .collect()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::read_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_read_only() {
        assert!(AccessPolicy::default().is_read_only());
        assert!(!AccessPolicy::from_read_only_flag(false).is_read_only());
    }

    #[test]
    fn test_blocked_keywords_by_mode() {
        let keywords = AccessPolicy::read_only().blocked_keywords();
        for expected in ["INSERT", "DROP", "CREATE EXTENSION", "COMMENT ON", "VACUUM", "REPLACE", "SET", "DO"] {
            assert!(keywords.iter().any(|k| k == expected), "missing {}", expected);
        }
        assert!(AccessPolicy::read_write().blocked_keywords().is_empty());
    }

    #[test]
    fn test_read_only_admits_read_verbs_only() {
        let read_only = AccessPolicy::read_only();
        for verb in ["SELECT", "with", "Show", "EXPLAIN", "VALUES", "PRAGMA"] {
            assert!(read_only.permits_verb(verb), "{}", verb);
        }
        for verb in ["REPLACE", "DO", "SET", "UPSERT", "BEGIN", "SELEC"] {
            assert!(!read_only.permits_verb(verb), "{}", verb);
            assert!(AccessPolicy::read_write().permits_verb(verb), "{}", verb);
        }
    }
}
