//! Security module for raw SQL validation and identifier quoting.

mod identifiers;
mod validation;

pub use identifiers::{
    quote_identifier, quote_table_reference, safe_identifier, safe_table_reference,
    validate_identifier, MAX_IDENTIFIER_LENGTH,
};
pub use validation::{validate, SqlValidator, ValidationReport, ValidationResult};
pub(crate) use validation::truncate_for_log;
