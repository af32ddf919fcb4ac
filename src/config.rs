//! Configuration management for the query guard.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MAX_QUERY_LINES, DEFAULT_ROW_LIMIT};
use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Raw SQL validation limits
    pub validation: ValidationConfig,

    /// Structured query builder settings
    pub builder: BuilderConfig,
}

/// Raw SQL validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum query length in characters
    pub max_query_length: usize,

    /// Line count above which a warning is emitted
    pub max_query_lines: usize,
}

/// Structured query builder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Row limit used when a request omits one
    pub default_limit: u64,

    /// Reject identifiers with whitespace, quotes or SQL metacharacters
    pub strict_identifiers: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// All optional:
    /// - `BQ_GUARD_MAX_QUERY_LENGTH`: Maximum raw SQL length (default: 10000)
    /// - `BQ_GUARD_MAX_QUERY_LINES`: Line count warning threshold (default: 100)
    /// - `BQ_GUARD_DEFAULT_LIMIT`: Default row limit for structured queries (default: 100)
    /// - `BQ_GUARD_STRICT_IDENTIFIERS`: Reject unsafe identifiers (default: false)
    pub fn from_env() -> Result<Self, QueryError> {
        let max_query_length =
            positive_var("BQ_GUARD_MAX_QUERY_LENGTH")?.unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        let max_query_lines =
            positive_var("BQ_GUARD_MAX_QUERY_LINES")?.unwrap_or(DEFAULT_MAX_QUERY_LINES);

        let default_limit = positive_var("BQ_GUARD_DEFAULT_LIMIT")?.unwrap_or(DEFAULT_ROW_LIMIT);

        let strict_identifiers = std::env::var("BQ_GUARD_STRICT_IDENTIFIERS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Config {
            validation: ValidationConfig {
                max_query_length,
                max_query_lines,
            },
            builder: BuilderConfig {
                default_limit,
                strict_identifiers,
            },
        })
    }
}

/// Read a positive integer variable; unset means `None`.
fn positive_var<T>(name: &str) -> Result<Option<T>, QueryError>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(QueryError::config(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_query_lines: DEFAULT_MAX_QUERY_LINES,
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
            strict_identifiers: false,
        }
    }
}
