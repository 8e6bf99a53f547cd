//! Ledger error model.
//!
//! Every fallible operation in the workspace returns [`LedgerResult`]. Errors
//! are grouped into a small set of [`ErrorKind`]s so callers can decide how to
//! react (fix input, retry, re-query) without matching on every variant.

use std::time::Duration;

use thiserror::Error;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Structural validation failure detected at a builder or parser boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field the builder cannot default was not supplied.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// A payload value is outside the closed value set (or otherwise unusable).
    #[error("invalid payload value at `{path}`: {reason}")]
    InvalidPayloadValue { path: String, reason: String },

    /// An identifier string could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// An argument was well-typed but not acceptable (e.g. non-positive amount).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Decimal / money codec failure. Never a rounding opportunity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("currency code must be non-empty")]
    EmptyCurrency,

    #[error("invalid decimal string: {0}")]
    InvalidDecimal(String),

    /// More than 9 fractional digits remain after trimming trailing zeros.
    #[error("amount has {scale} fractional digits; fixed-point money allows at most 9")]
    PrecisionOverflow { scale: u32 },

    /// `nanos` out of range or sign-inconsistent with `units`.
    #[error("malformed money: {0}")]
    MalformedMoney(String),

    /// Integral part does not fit in the signed 64-bit `units` field.
    #[error("amount exceeds the range of money units")]
    UnitsOutOfRange,

    /// An accumulated amount left the exact decimal range.
    #[error("{0} exceeds the exact decimal range")]
    Overflow(String),
}

/// Ledger-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The event store rejected or failed a write/read. The event is not part
    /// of the source of truth.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Optimistic concurrency check (or duplicate registration) failed.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The operation did not finish in time. Its outcome is unknown; re-query
    /// before assuming anything about persistence.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Coarse classification of [`LedgerError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Precision,
    Persistence,
    Conflict,
    NotFound,
    Timeout,
}

impl ErrorKind {
    /// Stable code for logs and wire error statuses.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_FAILED",
            ErrorKind::Precision => "PRECISION_ERROR",
            ErrorKind::Persistence => "PERSISTENCE_FAILED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Timeout => "TIMEOUT",
        }
    }
}

impl LedgerError {
    pub fn missing(field: &'static str) -> Self {
        Self::Validation(ValidationError::MissingRequiredField(field))
    }

    pub fn invalid_payload(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidPayloadValue {
            path: path.into(),
            reason: reason.into(),
        })
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidIdentifier(msg.into()))
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidArgument(msg.into()))
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::Codec(CodecError::EmptyCurrency | CodecError::InvalidDecimal(_)) => {
                ErrorKind::Validation
            }
            LedgerError::Codec(_) => ErrorKind::Precision,
            LedgerError::Persistence(_) => ErrorKind::Persistence,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// `Conflict` is fixed by retrying; `Timeout` by re-querying and then retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_) | LedgerError::Timeout { .. })
    }
}
