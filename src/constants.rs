//! Centralized constants for the query guard.
//!
//! Limits and defaults used by the validator, the builder and the
//! configuration loader.

// =============================================================================
// Validation Limits
// =============================================================================

/// Maximum raw SQL length, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 10_000;

/// Line count above which a query draws a warning.
pub const DEFAULT_MAX_QUERY_LINES: usize = 100;

// =============================================================================
// Builder Defaults
// =============================================================================

/// Row limit applied when a structured query omits one or passes a non-positive value.
pub const DEFAULT_ROW_LIMIT: u64 = 100;

/// Prefix for generated named parameters (`p_0`, `p_1`, ...).
pub const PARAMETER_PREFIX: &str = "p_";

/// Placeholder substituted for string literals before keyword screening.
pub const STRING_LITERAL_PLACEHOLDER: &str = "'STRING'";

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_positive() {
        assert!(DEFAULT_MAX_QUERY_LENGTH > 0);
        assert!(DEFAULT_MAX_QUERY_LINES > 0);
        assert!(DEFAULT_ROW_LIMIT > 0);
    }

    #[test]
    fn test_placeholder_is_quoted() {
        assert!(STRING_LITERAL_PLACEHOLDER.starts_with('\''));
        assert!(STRING_LITERAL_PLACEHOLDER.ends_with('\''));
    }
}
