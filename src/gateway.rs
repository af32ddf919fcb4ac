//! Request routing to the execution collaborator.
//!
//! Raw SQL is forwarded only when the validator finds no errors. Structured
//! requests are built into parameterized SQL and forwarded without further
//! screening, since values never reach the SQL text.

use crate::config::Config;
use crate::constants::LOG_QUERY_TRUNCATE_LENGTH;
use crate::error::QueryError;
use crate::query::{BuiltQuery, QueryBuilder, QueryParameter, StructuredQuery};
use crate::security::{truncate_for_log, SqlValidator, ValidationReport, ValidationResult};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};

/// Executes SQL against the analytical engine.
///
/// Implementations own connection handling, retries and row decoding.
pub trait QueryExecutor: Send + Sync {
    /// What a successful execution yields.
    type Output: Send;

    fn execute(
        &self,
        query: &BuiltQuery,
    ) -> impl Future<Output = Result<Self::Output, QueryError>> + Send;
}

/// The request an engine would receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub query: String,
    pub query_parameters: Vec<QueryParameter>,
}

/// Executor that returns the submission instead of running it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl QueryExecutor for DryRunExecutor {
    type Output = Submission;

    async fn execute(&self, query: &BuiltQuery) -> Result<Submission, QueryError> {
        Ok(Submission {
            query: query.sql_text.clone(),
            query_parameters: query.query_parameters(),
        })
    }
}

/// Validates or builds requests, then hands them to an executor.
#[derive(Debug, Clone)]
pub struct QueryGateway<E> {
    validator: SqlValidator,
    builder: QueryBuilder,
    executor: E,
}

impl<E: QueryExecutor> QueryGateway<E> {
    /// Create a gateway.
    pub fn new(config: &Config, executor: E) -> Self {
        Self {
            validator: SqlValidator::from_config(&config.validation),
            builder: QueryBuilder::from_config(&config.builder),
            executor,
        }
    }

    /// Validate raw SQL without executing it.
    pub fn validate(&self, sql: &str) -> ValidationResult {
        self.validator.validate(sql)
    }

    /// Validate raw SQL and attach request metrics.
    pub fn report(&self, sql: &str) -> ValidationReport {
        self.validator.report(sql)
    }

    /// Build a structured query without executing it.
    pub fn build(&self, query: &StructuredQuery) -> Result<BuiltQuery, QueryError> {
        self.builder.build(query)
    }

    /// Validate raw SQL and execute it if no errors were found.
    pub async fn run_sql(&self, sql: &str) -> Result<E::Output, QueryError> {
        let result = self.validator.validate(sql);

        if !result.is_valid() {
            let reason = result.errors().join(", ");
            warn!(
                "Rejected query ({}): {}",
                reason,
                truncate_for_log(sql, LOG_QUERY_TRUNCATE_LENGTH)
            );
            return Err(QueryError::validation(reason));
        }

        if !result.warnings().is_empty() {
            warn!("Query warnings: {}", result.warnings().join(", "));
        }

        debug!(
            "Forwarding raw query: {}",
            truncate_for_log(sql, LOG_QUERY_TRUNCATE_LENGTH)
        );
        self.executor.execute(&BuiltQuery::raw(sql)).await
    }

    /// Build a structured query and execute it.
    pub async fn run_structured(&self, query: &StructuredQuery) -> Result<E::Output, QueryError> {
        let built = self.builder.build(query).inspect_err(|e| {
            warn!("Rejected structured query on '{}': {}", query.table, e);
        })?;
        self.executor.execute(&built).await
    }

    /// Access the underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }
}
