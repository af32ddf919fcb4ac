//! Identifier quoting for backtick-delimited SQL dialects.
//!
//! Table references take the form `dataset.table` or `project.dataset.table`
//! and are quoted segment by segment (`` `project`.`dataset`.`table` ``).

use crate::error::QueryError;

/// Maximum length for a single identifier segment.
pub const MAX_IDENTIFIER_LENGTH: usize = 1024;

const BACKTICK: char = '`';

/// Quote a column name.
///
/// Embedded backticks are removed before wrapping, so the result always
/// contains exactly two backticks.
///
/// # Examples
///
/// ```
/// use bq_query_guard::security::quote_identifier;
///
/// assert_eq!(quote_identifier("total").unwrap(), "`total`");
/// assert_eq!(quote_identifier("to`tal").unwrap(), "`total`");
/// assert!(quote_identifier("  ").is_err());
/// ```
pub fn quote_identifier(name: &str) -> Result<String, QueryError> {
    if name.trim().is_empty() {
        return Err(QueryError::invalid_argument("Identifier cannot be empty"));
    }

    let clean: String = name.chars().filter(|c| *c != BACKTICK).collect();
    if clean.trim().is_empty() {
        return Err(QueryError::invalid_argument(format!(
            "Identifier '{}' is empty once backticks are removed",
            name
        )));
    }

    Ok(format!("`{}`", clean))
}

/// Quote a `dataset.table` or `project.dataset.table` reference.
///
/// # Examples
///
/// ```
/// use bq_query_guard::security::quote_table_reference;
///
/// assert_eq!(quote_table_reference("ds.orders").unwrap(), "`ds`.`orders`");
/// assert_eq!(
///     quote_table_reference("my-project.ds.orders").unwrap(),
///     "`my-project`.`ds`.`orders`"
/// );
/// assert!(quote_table_reference("orders").is_err());
/// ```
pub fn quote_table_reference(reference: &str) -> Result<String, QueryError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(QueryError::invalid_argument("Table reference cannot be empty"));
    }

    let segments: Vec<&str> = trimmed.split('.').collect();
    if !(2..=3).contains(&segments.len()) {
        return Err(QueryError::invalid_argument(format!(
            "Table reference '{}' must be 'dataset.table' or 'project.dataset.table'",
            reference
        )));
    }

    let quoted = segments
        .iter()
        .map(|segment| {
            if segment.trim().is_empty() {
                return Err(QueryError::invalid_argument(format!(
                    "Table reference '{}' contains an empty segment",
                    reference
                )));
            }
            quote_identifier(segment)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quoted.join("."))
}

/// Validate that an identifier contains only safe characters.
///
/// This is a stricter check than quoting alone: it rejects whitespace,
/// quotes, backticks and SQL metacharacters instead of sanitizing them.
pub fn validate_identifier(identifier: &str) -> Result<(), QueryError> {
    if identifier.is_empty() {
        return Err(QueryError::invalid_argument("Identifier cannot be empty"));
    }

    if identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(QueryError::invalid_argument(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    let dangerous_patterns = [
        "--",   // SQL comment
        "/*",   // Multi-line comment start
        "*/",   // Multi-line comment end
        ";",    // Statement separator
        "'",    // String delimiter
        "\"",   // String delimiter
        "`",    // Identifier delimiter
        "\\",   // Escape character
        "(",    // Function call / subquery
        ")",
        "@",    // Parameter marker
        "\x00", // Null byte
    ];

    for pattern in &dangerous_patterns {
        if identifier.contains(pattern) {
            return Err(QueryError::invalid_argument(format!(
                "Identifier contains forbidden character sequence: {}",
                pattern.escape_default()
            )));
        }
    }

    if identifier.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(QueryError::invalid_argument(format!(
            "Identifier '{}' contains whitespace or control characters",
            identifier.escape_default()
        )));
    }

    Ok(())
}

/// Validate every segment of a table reference, then quote it.
pub fn safe_table_reference(reference: &str) -> Result<String, QueryError> {
    for segment in reference.trim().split('.') {
        validate_identifier(segment)?;
    }
    quote_table_reference(reference)
}

/// Validate and quote a column name.
pub fn safe_identifier(identifier: &str) -> Result<String, QueryError> {
    validate_identifier(identifier)?;
    quote_identifier(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_simple_identifier() {
        assert_eq!(quote_identifier("order_id").unwrap(), "`order_id`");
        assert_eq!(quote_identifier("My Column").unwrap(), "`My Column`");
    }

    #[test]
    fn test_quote_strips_backticks() {
        assert_eq!(quote_identifier("a`b").unwrap(), "`ab`");
        assert_eq!(
            quote_identifier("x` = 1 OR `y").unwrap(),
            "`x = 1 OR y`"
        );
        assert!(quote_identifier("``").is_err());
    }

    #[test]
    fn test_empty_identifier() {
        assert!(matches!(
            quote_identifier(""),
            Err(QueryError::InvalidArgument(_))
        ));
        assert!(quote_identifier("   ").is_err());
    }

    #[test]
    fn test_quote_table_reference() {
        assert_eq!(quote_table_reference("ds.tbl").unwrap(), "`ds`.`tbl`");
        assert_eq!(
            quote_table_reference("proj.ds.tbl").unwrap(),
            "`proj`.`ds`.`tbl`"
        );
    }

    #[test]
    fn test_malformed_table_reference() {
        for bad in ["", "tbl", "a.b.c.d", "ds.", ".tbl", "a..b", "a. .b"] {
            assert!(
                matches!(quote_table_reference(bad), Err(QueryError::InvalidArgument(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_table_reference_cannot_break_out() {
        assert_eq!(
            quote_table_reference("ds.t`; DROP").unwrap(),
            "`ds`.`t; DROP`"
        );
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("created_at").is_ok());
        assert!(validate_identifier("my-project").is_ok());

        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("x--").is_err());
        assert!(validate_identifier("x;DROP").is_err());
        assert!(validate_identifier("x'").is_err());
        assert!(validate_identifier("x`").is_err());
        assert!(validate_identifier("count(*)").is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_safe_variants() {
        assert_eq!(safe_identifier("total").unwrap(), "`total`");
        assert!(safe_identifier("to tal").is_err());
        assert_eq!(
            safe_table_reference("proj.ds.tbl").unwrap(),
            "`proj`.`ds`.`tbl`"
        );
        assert!(safe_table_reference("ds.my table").is_err());
    }
}
