use aws_sdk_dynamodb::error::BuildError;
use std::fmt;
use thiserror::Error;

use crate::record::ColumnKind;

/// Kind of failure reported by a [`BulkStore`](crate::store::BulkStore) call
///
/// The dispatcher and the poller branch on this value instead of on concrete
/// error types, so every backend has to map its own failures onto one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The named table does not exist
    NotFound,
    /// Rate limiting or another transient condition; the request may be resent
    Throttled,
    /// Anything else. Never retried
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::NotFound => write!(f, "resource not found"),
            StoreErrorKind::Throttled => write!(f, "throttled"),
            StoreErrorKind::Other => write!(f, "store failure"),
        }
    }
}

/// Error returned by a bulk store backend
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    /// Classification used for retry decisions
    pub kind: StoreErrorKind,
    /// Human readable detail, usually naming the table
    pub message: String,
}

impl StoreError {
    /// Create a store error of the given kind
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The resource does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    /// The request was throttled and may be retried
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Throttled, message)
    }

    /// A non-retryable failure
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, message)
    }

    /// Check if the store reported a missing resource
    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    /// Check if the failure is transient and the request can be resent
    pub fn is_transient(&self) -> bool {
        self.kind == StoreErrorKind::Throttled
    }
}

impl From<BuildError> for StoreError {
    fn from(e: BuildError) -> Self {
        StoreError::other(format!("DynamoDB request builder error: {e}"))
    }
}

/// Bulk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid settings, a missing table, or a store rejection that cannot be retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A key column is absent from the schema or has no value in a record
    #[error("record {record}: no value for key column '{column}'")]
    MissingKey {
        /// Source column name
        column: String,
        /// Zero-based position of the record in the source
        record: usize,
    },

    /// A binary-flagged column holds text that is not valid base64
    #[error("record {record}: column '{column}' is not valid base64: {reason}")]
    MalformedBinary {
        /// Source column name
        column: String,
        /// Zero-based position of the record in the source
        record: usize,
        /// Decoder message
        reason: String,
    },

    /// A cell value does not match the type declared for its column
    #[error("record {record}: column '{column}' expected a {expected} value")]
    TypeMismatch {
        /// Source column name
        column: String,
        /// Zero-based position of the record in the source
        record: usize,
        /// Declared column type
        expected: ColumnKind,
    },

    /// The record source failed to produce a record
    #[error("record {record}: source error: {reason}")]
    Source {
        /// Zero-based position of the record that could not be read
        record: usize,
        /// Source specific message
        reason: String,
    },

    /// Cancellation was requested through the progress sink
    #[error("operation cancelled")]
    Cancelled,

    /// A batch still had unprocessed items when the attempt limit was reached
    #[error("table '{table}': {remaining} items still unprocessed after {attempts} attempts")]
    RetriesExhausted {
        /// Target table
        table: String,
        /// Items the store never accepted
        remaining: usize,
        /// Attempts made, including the first
        attempts: u32,
    },

    /// The poll limit was reached before the table reached its target state
    #[error("table '{table}': target state not reached after {polls} polls (last seen: {last})")]
    PollExhausted {
        /// Polled table
        table: String,
        /// Describe calls made
        polls: u32,
        /// Last observed status
        last: String,
    },

    /// Fatal store failure
    #[error("bulk store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or parsed
    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    /// Check if the run stopped because of a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if the error is a configuration problem
    ///
    /// Covers invalid settings, tables that do not exist and unparseable
    /// configuration files.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Config(_))
    }

    /// Position of the offending record, for record level failures
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Error::MissingKey { record, .. }
            | Error::MalformedBinary { record, .. }
            | Error::TypeMismatch { record, .. }
            | Error::Source { record, .. } => Some(*record),
            _ => None,
        }
    }
}
