//! Error types for the leave balance ledger.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every error condition the ledger can surface. Each error belongs to an
//! [`ErrorKind`] so callers can decide between rejecting, retrying, or
//! escalating without matching on every variant.

use rust_decimal::Decimal;
use thiserror::Error;

/// Broad category of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input shape, rejected before any state was read.
    Validation,
    /// The current state does not allow the operation.
    Precondition,
    /// The key was contended; the operation can be retried.
    Concurrency,
    /// A leave type policy or configuration file is unusable.
    Configuration,
    /// The backing store failed.
    Storage,
}

/// The main error type for the leave balance ledger.
///
/// All ledger operations return this error type. No variant is ever
/// returned after a partial mutation: a failed operation leaves state
/// untouched.
///
/// # Example
///
/// ```
/// use leave_ledger::error::{ErrorKind, LedgerError};
///
/// let error = LedgerError::NothingToReverse {
///     leave_request_id: "lr_42".to_string(),
/// };
/// assert_eq!(error.to_string(), "Nothing to reverse for leave request 'lr_42'");
/// assert_eq!(error.kind(), ErrorKind::Precondition);
/// ```
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An input field was malformed or out of range.
    #[error("Invalid field '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A balance row already exists for the key.
    #[error("Leave balance already exists for {key}")]
    AlreadyExists {
        /// The balance key, formatted as `employee/leave_type/year`.
        key: String,
    },

    /// The operation would drive available leave below zero.
    #[error("Insufficient balance for {key}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// The balance key.
        key: String,
        /// Days available before the operation.
        available: Decimal,
        /// Days the operation tried to take.
        requested: Decimal,
    },

    /// A leave type policy is internally inconsistent.
    #[error("Invalid policy for leave type '{leave_type}': {message}")]
    InvalidPolicy {
        /// The leave type id or code.
        leave_type: String,
        /// A description of the inconsistency.
        message: String,
    },

    /// The target year of a rollover already has a balance row.
    #[error("Leave balance {key} has already been rolled over")]
    AlreadyRolledOver {
        /// The balance key of the target year.
        key: String,
    },

    /// No consumption was recorded for the leave request.
    #[error("Nothing to reverse for leave request '{leave_request_id}'")]
    NothingToReverse {
        /// The leave request id.
        leave_request_id: String,
    },

    /// The leave request has already consumed balance.
    #[error("Leave request '{leave_request_id}' has already been consumed")]
    AlreadyConsumed {
        /// The leave request id.
        leave_request_id: String,
    },

    /// Encashment was refused for the balance.
    #[error("Encashment not allowed for {key}: {message}")]
    EncashmentNotAllowed {
        /// The balance key.
        key: String,
        /// Why the encashment was refused.
        message: String,
    },

    /// An entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "leave balance").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The key is held by another operation, or its version moved underneath us.
    #[error("Busy: {resource} ({message})")]
    Busy {
        /// The contended resource.
        resource: String,
        /// Details about the contention.
        message: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the failure.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParse {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::Validation`] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`LedgerError::NotFound`] error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::AlreadyExists { .. }
            | Self::InsufficientBalance { .. }
            | Self::AlreadyRolledOver { .. }
            | Self::NothingToReverse { .. }
            | Self::AlreadyConsumed { .. }
            | Self::EncashmentNotAllowed { .. }
            | Self::NotFound { .. } => ErrorKind::Precondition,
            Self::Busy { .. } => ErrorKind::Concurrency,
            Self::InvalidPolicy { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                ErrorKind::Configuration
            }
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Returns true if the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }
}

/// A type alias for Results that return LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;
