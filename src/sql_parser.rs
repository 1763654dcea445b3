//! SQL lexing utilities: comment stripping, keyword extraction and the
//! token scan the classifier matches its rules against
//!
//! Uses the sqlparser tokenizer so string literals, quoted identifiers and
//! dollar-quoted bodies are never mistaken for keywords or comments. When the
//! tokenizer rejects the input (unterminated quotes and the like) a lenient
//! regex scan takes over; scanning never fails.

use crate::error::DatabaseError;
use crate::types::DatabaseType;
use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// Get appropriate SQL dialect for the database type
pub(crate) fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL | DatabaseType::MariaDB => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

fn is_comment(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::SingleLineComment { .. })
            | Token::Whitespace(Whitespace::MultiLineComment(_))
    )
}

/// Strip SQL comments (single-line and multi-line) using sqlparser tokenizer
///
/// String literals, dollar-quoted bodies and quoted identifiers keep any
/// comment-like text they contain.
///
/// # Examples
/// ```
/// # use sql_gateway::sql_parser::strip_comments;
/// # use sql_gateway::types::DatabaseType;
/// let sql = "SELECT * FROM users -- get all\n/* WHERE active */";
/// let cleaned = strip_comments(sql, DatabaseType::Postgres);
/// assert_eq!(cleaned.trim(), "SELECT * FROM users");
///
/// let sql = "SELECT $$ -- not a comment $$ FROM t";
/// let cleaned = strip_comments(sql, DatabaseType::Postgres);
/// assert!(cleaned.contains("-- not a comment"));
/// ```
///
/// If tokenization fails the input is returned unchanged.
pub fn strip_comments(sql: &str, db_type: DatabaseType) -> String {
    let dialect = get_dialect(db_type);
    let mut tokenizer = Tokenizer::new(&*dialect, sql);

    match tokenizer.tokenize() {
        Ok(tokens) => tokens
            .iter()
            .filter(|token| !is_comment(token))
            .map(|token| token.to_string())
            .collect::<Vec<_>>()
            .join(""),
        Err(_) => sql.to_string(),
    }
}

/// Extract first SQL keyword from statement (after stripping comments)
///
/// # Examples
/// ```
/// # use sql_gateway::sql_parser::extract_first_keyword;
/// # use sql_gateway::types::DatabaseType;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sql = "  SELECT * FROM users";
/// assert_eq!(extract_first_keyword(sql, DatabaseType::Postgres)?, "select");
///
/// let sql = "(select 1) union (select 2)";
/// assert_eq!(extract_first_keyword(sql, DatabaseType::Postgres)?, "select");
/// # Ok(())
/// # }
/// ```
pub fn extract_first_keyword(sql: &str, db_type: DatabaseType) -> Result<String, DatabaseError> {
    let cleaned = strip_comments(sql, db_type);
    let trimmed = cleaned.trim().trim_start_matches(['(', ' ', '\t', '\n', '\r']);

    if trimmed.is_empty() {
        return Err(DatabaseError::ExecutionError(
            "Empty SQL statement after stripping comments".to_string(),
        ));
    }

    let keyword = trimmed
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find(|word| !word.is_empty())
        .ok_or_else(|| DatabaseError::ExecutionError("No SQL keyword found".to_string()))?
        .to_lowercase();

    Ok(keyword)
}

#[derive(Debug, Clone, PartialEq)]
enum Significant {
    /// Unquoted word, uppercased
    Word(String),
    OpenParen,
    Other,
}

/// Token-level view of one statement
///
/// Holds the unquoted words in order, the names invoked as functions, whether
/// a comment or a second statement appears outside literals, and a
/// normalized comparison form: significant tokens joined by single spaces,
/// bare words uppercased and every string literal masked as `'?'`.
#[derive(Debug, Clone, Default)]
pub struct ScannedStatement {
    tokens: Vec<Significant>,
    comparison: String,
    has_comment: bool,
    stacked: bool,
    lenient: bool,
}

static QUOTED_LENIENT: Lazy<Regex> =
    lazy_regex!(r#"(?s)'(?:[^']|'')*'?|"(?:[^"]|"")*"?|`[^`]*`?|\$\$.*?(?:\$\$|$)"#);
static LEXEME_LENIENT: Lazy<Regex> =
    lazy_regex!(r#"[A-Za-z_][A-Za-z0-9_$]*|\d+(?:\.\d+)?|'\?'|"\?"|\S"#);

impl ScannedStatement {
    /// Scan `sql` with the dialect of `db_type`.
    pub fn scan(sql: &str, db_type: DatabaseType) -> Self {
        let dialect = get_dialect(db_type);
        match Tokenizer::new(&*dialect, sql).tokenize() {
            Ok(tokens) => Self::from_tokens(&tokens),
            Err(e) => {
                log::debug!("Tokenizer rejected statement, using lenient scan: {}", e);
                Self::lenient(sql, db_type)
            }
        }
    }

    fn from_tokens(tokens: &[Token]) -> Self {
        let mut scanned = Self::default();
        let mut parts: Vec<String> = Vec::new();
        let mut after_semicolon = false;

        for token in tokens {
            if is_comment(token) {
                scanned.has_comment = true;
                continue;
            }
            let (significant, text) = match token {
                Token::Whitespace(_) | Token::EOF => continue,
                Token::SemiColon => {
                    after_semicolon = true;
                    parts.push(";".to_string());
                    continue;
                }
                Token::Word(word) if word.quote_style.is_none() => {
                    let upper = word.value.to_uppercase();
                    (Significant::Word(upper.clone()), upper)
                }
                Token::LParen => (Significant::OpenParen, "(".to_string()),
                Token::SingleQuotedString(_)
                | Token::DoubleQuotedString(_)
                | Token::DollarQuotedString(_)
                | Token::NationalStringLiteral(_)
                | Token::EscapedStringLiteral(_)
                | Token::HexStringLiteral(_)
                | Token::SingleQuotedByteStringLiteral(_)
                | Token::DoubleQuotedByteStringLiteral(_) => (Significant::Other, "'?'".to_string()),
                other => (Significant::Other, other.to_string()),
            };
            if after_semicolon {
                scanned.stacked = true;
            }
            scanned.tokens.push(significant);
            parts.push(text);
        }

        scanned.comparison = parts.join(" ");
        scanned
    }

    fn lenient(sql: &str, db_type: DatabaseType) -> Self {
        let masked = QUOTED_LENIENT.replace_all(sql, |caps: &lazy_regex::regex::Captures<'_>| {
            match caps.get(0).map(|m| m.as_str().as_bytes().first().copied()) {
                Some(Some(b'\'')) | Some(Some(b'$')) => "'?'",
                _ => "\"?\"",
            }
        });

        let mut scanned = Self {
            lenient: true,
            ..Self::default()
        };
        scanned.has_comment = masked.contains("--")
            || masked.contains("/*")
            || (db_type.is_mysql_family() && masked.contains('#'));

        let mut parts = Vec::new();
        let mut after_semicolon = false;
        for lexeme in LEXEME_LENIENT.find_iter(&masked).map(|m| m.as_str()) {
            if lexeme == ";" {
                after_semicolon = true;
                parts.push(";".to_string());
                continue;
            }
            if after_semicolon {
                scanned.stacked = true;
            }
            let starts_word = lexeme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if starts_word {
                let upper = lexeme.to_uppercase();
                scanned.tokens.push(Significant::Word(upper.clone()));
                parts.push(upper);
            } else if lexeme == "(" {
                scanned.tokens.push(Significant::OpenParen);
                parts.push(lexeme.to_string());
            } else {
                scanned.tokens.push(Significant::Other);
                parts.push(lexeme.to_string());
            }
        }
        scanned.comparison = parts.join(" ");
        scanned
    }

    /// Normalized text for structural regex rules.
    pub fn comparison_form(&self) -> &str {
        &self.comparison
    }

    pub fn has_comment(&self) -> bool {
        self.has_comment
    }

    /// True when a token follows a `;`. A single trailing semicolon is not stacking.
    pub fn is_stacked(&self) -> bool {
        self.stacked
    }

    /// True when the tokenizer failed and the regex fallback produced this scan.
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Unquoted words, uppercased, in statement order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Significant::Word(w) => Some(w.as_str()),
            _ => None,
        })
    }

    /// Unquoted words immediately followed by `(`.
    pub fn calls(&self) -> impl Iterator<Item = &str> {
        self.tokens.windows(2).filter_map(|pair| match pair {
            [Significant::Word(w), Significant::OpenParen] => Some(w.as_str()),
            _ => None,
        })
    }

    /// Tokens after any opening parentheses.
    fn leading_tokens(&self) -> &[Significant] {
        let skip = self
            .tokens
            .iter()
            .take_while(|t| **t == Significant::OpenParen)
            .count();
        &self.tokens[skip..]
    }

    /// The statement verb: first unquoted word, uppercased, ignoring opening parentheses.
    pub fn leading_word(&self) -> Option<&str> {
        match self.leading_tokens().first() {
            Some(Significant::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    /// Whether the statement opens with `sequence` as consecutive unquoted words.
    pub fn starts_with_keywords(&self, sequence: &[&str]) -> bool {
        let leading = self.leading_tokens();
        !sequence.is_empty()
            && sequence.len() <= leading.len()
            && leading.iter().zip(sequence).all(|(token, expected)| {
                matches!(token, Significant::Word(w) if w.eq_ignore_ascii_case(expected))
            })
    }

    /// Whether `sequence` occurs as consecutive unquoted words.
    pub fn find_keyword_sequence(&self, sequence: &[&str]) -> bool {
        if sequence.is_empty() || sequence.len() > self.tokens.len() {
            return false;
        }
        self.tokens.windows(sequence.len()).any(|window| {
            window.iter().zip(sequence).all(|(token, expected)| {
                matches!(token, Significant::Word(w) if w.eq_ignore_ascii_case(expected))
            })
        })
    }
}
