//! Transaction error types
//!
//! Defines the closed error union for the transaction core. Driver errors are
//! classified exactly once, at the `From` conversion boundary; nothing
//! downstream inspects raw driver error shapes again.

use std::time::Duration;

use thiserror::Error;

/// Classification of a failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient failure expected to succeed if the unit of work is re-run.
    Retryable,
    /// Permanent failure; retrying would repeat the same outcome.
    Fatal,
    /// The unit of work exceeded its hard timeout. Never retried, to avoid
    /// compounding load while the database is already under distress.
    Timeout,
}

/// Severity level for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Kind of database constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::ForeignKey => write!(f, "foreign_key"),
            Self::NotNull => write!(f, "not_null"),
            Self::Check => write!(f, "check"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Transaction error type
///
/// Every failure surfaced by the transaction core is one of these variants.
/// Unknown driver errors map to `Internal` and are treated as fatal - an
/// unclassified error is never silently retried.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Constraint violation ({constraint}): {message}")]
    ConstraintViolation { constraint: ConstraintKind, message: String },

    #[error("Transient contention: {0}")]
    TransientContention(String),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Operation '{operation}' timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transaction result type
pub type TxResult<T> = Result<T, TxError>;

impl TxError {
    /// Create a validation error for a specific field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error for the retry policy
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TransientContention(_) | Self::ConnectionFailure(_) => ErrorClass::Retryable,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Validation { .. } | Self::ConstraintViolation { .. } | Self::Internal(_) => {
                ErrorClass::Fatal
            }
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Get the error severity level for logging and alerting
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation { .. } => ErrorSeverity::Error,
            Self::ConstraintViolation { .. } => ErrorSeverity::Error,
            Self::TransientContention(_) => ErrorSeverity::Warning,
            Self::ConnectionFailure(_) => ErrorSeverity::Warning,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Stable label for metrics and API error bodies
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::TransientContention(_) => "transient_contention",
            Self::ConnectionFailure(_) => "connection_failure",
            Self::Timeout { .. } => "operation_timeout",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Classify a raw SQLite error.
///
/// BUSY and LOCKED are the SQLite spellings of lock-wait contention and are
/// retryable. Constraint violations are fatal. Everything unrecognized fails
/// closed as `Internal`.
impl From<rusqlite::Error> for TxError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::TransientContention(err.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => {
                let message = err.to_string();
                let constraint = classify_constraint(&message);
                Self::ConstraintViolation { constraint, message }
            }
            _ => Self::Internal(format!("driver error: {err}")),
        }
    }
}

/// Pool acquisition failures may be transient (exhaustion, acquire timeout).
impl From<r2d2::Error> for TxError {
    fn from(err: r2d2::Error) -> Self {
        Self::ConnectionFailure(format!("failed to get connection: {err}"))
    }
}

fn classify_constraint(message: &str) -> ConstraintKind {
    let message = message.to_uppercase();
    if message.contains("UNIQUE") {
        ConstraintKind::Unique
    } else if message.contains("FOREIGN KEY") {
        ConstraintKind::ForeignKey
    } else if message.contains("NOT NULL") {
        ConstraintKind::NotNull
    } else if message.contains("CHECK") {
        ConstraintKind::Check
    } else {
        ConstraintKind::Other
    }
}
