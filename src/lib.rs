//! # BQ Query Guard
//!
//! Keeps what reaches an analytical warehouse syntactically constrained and
//! free of value-level injection.
//!
//! This crate provides:
//! - **Validation**: lexical screening of raw SQL (blocked keywords, single
//!   `SELECT` shape, size and character checks)
//! - **Structured queries**: descriptor → parameterized SQL with quoted
//!   identifiers and `@p_<n>` named parameters
//! - **Gateway**: routes both paths to a pluggable [`QueryExecutor`]
//!
//! ## Example
//!
//! ```
//! use bq_query_guard::query::{build, StructuredQuery};
//! use bq_query_guard::security::validate;
//!
//! assert!(!validate("SELECT 1; DROP TABLE t").is_valid());
//!
//! let built = build(&StructuredQuery::new("sales.orders").filter("status", "PAID")).unwrap();
//! assert_eq!(
//!     built.sql_text,
//!     "SELECT * FROM `sales`.`orders` WHERE `status` = @p_0 LIMIT 100"
//! );
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod query;
pub mod security;
pub mod transport;

pub use config::Config;
pub use error::QueryError;
pub use gateway::{DryRunExecutor, QueryExecutor, QueryGateway};
