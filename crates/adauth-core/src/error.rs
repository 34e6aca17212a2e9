//! Error types for directory operations.
//!
//! This module provides the error type shared by domain derivation, UPN construction and
//! directory searches, including the aggregate variant used when several independent
//! attempts fail.

use crate::aggregate::AggregatingError;
use thiserror::Error;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration error (for example a base DN without any `dc=` component)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A search against one search root failed at the transport layer
    #[error("Search error \"{filter}\": {message}")]
    SearchError {
        /// Filter that was being evaluated
        filter: String,
        /// Underlying cause
        message: String,
    },

    /// A single-entry search matched more than one entry
    #[error("Search error \"{filter}\": more than one entry returned")]
    AmbiguousResult {
        /// Filter that was being evaluated
        filter: String,
    },

    /// A single-entry search matched nothing
    #[error("Search error \"{filter}\": no entries returned")]
    NoEntries {
        /// Filter that was being evaluated
        filter: String,
    },

    /// External service error
    #[error("External service error: {service}: {message}")]
    ExternalServiceError {
        /// Service name that failed
        service: String,
        /// Error message
        message: String,
    },

    /// Several independent failures collected during one operation
    #[error(transparent)]
    Aggregate(AggregatingError),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::SearchError { .. } => "SEARCH_ERROR",
            Self::AmbiguousResult { .. } => "AMBIGUOUS_RESULT",
            Self::NoEntries { .. } => "NO_ENTRIES",
            Self::ExternalServiceError { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Aggregate(_) => "AGGREGATE",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_)
                | Self::ExternalServiceError { .. }
                | Self::SearchError { .. }
                | Self::Aggregate(_)
        )
    }

    /// Individual messages carried by this error, if it is an aggregate of several failures.
    ///
    /// Used by [`AggregatingError::add_error`] to flatten nested aggregates.
    #[must_use]
    pub fn sub_messages(&self) -> Option<&[String]> {
        match self {
            Self::Aggregate(aggregate) => Some(aggregate.messages()),
            _ => None,
        }
    }
}

impl From<AggregatingError> for Error {
    fn from(err: AggregatingError) -> Self {
        Self::Aggregate(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
