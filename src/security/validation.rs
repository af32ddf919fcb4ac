//! Lexical screening of raw SQL.
//!
//! The validator never parses SQL. It strips comments and string literals,
//! then runs a fixed set of keyword, shape, size and character checks over
//! what is left. Every check runs on every call so a single result carries
//! all problems at once.

use crate::config::ValidationConfig;
use crate::constants::{
    DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MAX_QUERY_LINES, LOG_QUERY_TRUNCATE_LENGTH,
    STRING_LITERAL_PLACEHOLDER,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Helper to compile a hardcoded regex with a useful message on failure.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Comments and string literals, matched in one left-to-right pass so that a
/// `--` inside a string is not mistaken for a comment (and vice versa).
static LEXICAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r#"(?s)--[^\n]*|/\*.*?\*/|'[^']*'|"[^"]*""#));

/// Keywords rejected anywhere outside comments and string literals.
static DANGEROUS_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "DROP",
        "DELETE",
        "TRUNCATE",
        "ALTER",
        "CREATE",
        "INSERT",
        "UPDATE",
        "GRANT",
        "REVOKE",
        "EXEC",
        "EXECUTE",
        "SHUTDOWN",
        "RESTORE",
        "BACKUP",
        "BULK",
        "OPENROWSET",
        "OPENDATASOURCE",
    ]
    .into_iter()
    .collect()
});

/// System and extended procedure prefixes.
const DANGEROUS_PREFIXES: [&str; 2] = ["SP_", "XP_"];

/// Result of validating a raw SQL string.
///
/// `valid` is always `errors.is_empty()`; warnings never affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    #[serde(rename = "errori")]
    errors: Vec<String>,
    #[serde(rename = "avvisi")]
    warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.valid = false;
    }

    fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Whether the query passed every check.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Errors in the order the checks produced them.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Non-fatal findings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Validation result enriched with request metrics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    #[serde(flatten)]
    pub result: ValidationResult,
    /// Query length in characters.
    pub query_length: usize,
    pub line_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Raw SQL validator.
#[derive(Debug, Clone)]
pub struct SqlValidator {
    max_length: usize,
    max_lines: usize,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MAX_QUERY_LINES)
    }
}

impl SqlValidator {
    /// Create a validator with explicit size limits.
    pub fn new(max_length: usize, max_lines: usize) -> Self {
        Self {
            max_length,
            max_lines,
        }
    }

    /// Create a validator from configuration.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.max_query_length, config.max_query_lines)
    }

    /// Validate a raw SQL string.
    pub fn validate(&self, sql: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if sql.trim().is_empty() {
            result.add_error("Query cannot be empty");
            return result;
        }

        let stripped = strip_comments_and_literals(sql);

        check_dangerous_keywords(&stripped, &mut result);
        check_shape(&stripped, &mut result);
        self.check_size(sql, &mut result);
        check_characters(sql, &mut result);

        debug!(
            "Validated query ({} errors, {} warnings): {}",
            result.errors.len(),
            result.warnings.len(),
            truncate_for_log(sql, LOG_QUERY_TRUNCATE_LENGTH)
        );

        result
    }

    /// Validate and attach length, line count and a timestamp.
    pub fn report(&self, sql: &str) -> ValidationReport {
        ValidationReport {
            result: self.validate(sql),
            query_length: sql.chars().count(),
            line_count: sql.lines().count(),
            timestamp: Utc::now(),
        }
    }

    fn check_size(&self, sql: &str, result: &mut ValidationResult) {
        if sql.chars().count() > self.max_length {
            result.add_error(format!(
                "Query is too long (maximum {} characters)",
                self.max_length
            ));
        }

        let lines = sql.lines().count();
        if lines > self.max_lines {
            result.add_warning(format!("Query is very long ({} lines)", lines));
        }
    }
}

/// Validate with the default limits.
pub fn validate(sql: &str) -> ValidationResult {
    SqlValidator::default().validate(sql)
}

/// Replace comments with a space and string literals with a neutral placeholder.
fn strip_comments_and_literals(sql: &str) -> String {
    LEXICAL_PATTERN
        .replace_all(sql, |caps: &Captures<'_>| {
            let matched = &caps[0];
            if matched.starts_with("--") || matched.starts_with("/*") {
                " ".to_string()
            } else {
                STRING_LITERAL_PLACEHOLDER.to_string()
            }
        })
        .into_owned()
}

fn check_dangerous_keywords(stripped: &str, result: &mut ValidationResult) {
    let upper = stripped.to_uppercase();
    let mut reported: Vec<String> = Vec::new();

    for token in upper.split_whitespace() {
        let word: String = token.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        // Letter-stripping drops the underscore, so prefixes match the raw token.
        let raw = token.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());

        let keyword = if DANGEROUS_KEYWORDS.contains(word.as_str()) {
            Some(word)
        } else {
            DANGEROUS_PREFIXES
                .iter()
                .find(|prefix| raw.starts_with(**prefix))
                .map(|prefix| (*prefix).to_string())
        };

        if let Some(keyword) = keyword {
            if !reported.contains(&keyword) {
                result.add_error(format!("Dangerous keyword detected: {}", keyword));
                reported.push(keyword);
            }
        }
    }
}

fn check_shape(stripped: &str, result: &mut ValidationResult) {
    if !stripped.trim().to_uppercase().starts_with("SELECT") {
        result.add_error("Query must start with SELECT");
    }

    if !parentheses_balanced(stripped) {
        result.add_error("Unbalanced parentheses in query");
    }

    let statements = stripped
        .split(';')
        .filter(|segment| !segment.trim().is_empty())
        .count();
    if statements > 1 {
        result.add_error("Only single SELECT statements allowed");
    }
}

fn check_characters(sql: &str, result: &mut ValidationResult) {
    // Tab, LF and CR are ordinary SQL whitespace.
    let has_control = sql
        .chars()
        .any(|c| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'));
    if has_control {
        result.add_error("Query contains invalid control characters");
    }

    if !sql.is_ascii() {
        result.add_warning("Query contains non-ASCII characters");
    }
}

fn parentheses_balanced(sql: &str) -> bool {
    let mut depth: i64 = 0;
    for c in sql.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}
