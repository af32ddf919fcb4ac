//! Error types for the query guard.
//!
//! Validation diagnostics are not errors: they are reported through
//! [`ValidationResult`](crate::security::ValidationResult). The variants here
//! cover failures that abort a single call.

use thiserror::Error;

/// Domain-specific errors for query validation and construction.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A structured request was malformed (blank identifier, bad table reference).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raw SQL was rejected by the validator.
    #[error("Query validation failed: {0}")]
    ValidationFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reported by the execution collaborator.
    #[error("Query execution error: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
            source: None,
        }
    }

    /// Create an execution error with a source.
    pub fn execution_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Execution {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller sent something that can be fixed and resubmitted.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::ValidationFailed(_))
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument(_) => {
                Some("Use a `dataset.table` or `project.dataset.table` reference and non-blank column names")
            }
            Self::ValidationFailed(_) => {
                Some("Submit a single SELECT statement without data-modifying keywords")
            }
            Self::Config(_) => Some("Check your environment variables and configuration"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::invalid_argument(format!("Malformed request: {}", e))
    }
}
