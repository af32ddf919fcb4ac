//! Structured query construction and parameter typing.

mod builder;
pub mod types;

pub use builder::{build, BuiltQuery, Filters, QueryBuilder, StructuredQuery};
pub use types::{bind, QueryParameter, TypedValue};
