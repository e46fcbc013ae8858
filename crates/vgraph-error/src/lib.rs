//! Error kinds for the execution core.
//!
//! Every operator threads `Result<T, ExecError>` through `next()` rather
//! than throwing: cancellation and constraint failures are normal return
//! values, not exceptional control flow.

use std::fmt;

/// The category of failure surfaced by an execution-core error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Bind,
    Parser,
    Runtime,
    ConstraintViolation,
    Interrupted,
    Storage,
    BufferManager,
    Transaction,
    Catalog,
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bind => "BindError",
            Self::Parser => "ParserError",
            Self::Runtime => "RuntimeError",
            Self::ConstraintViolation => "ConstraintViolation",
            Self::Interrupted => "Interrupted",
            Self::Storage => "StorageError",
            Self::BufferManager => "BufferManagerError",
            Self::Transaction => "TransactionError",
            Self::Catalog => "CatalogError",
            Self::NotImplemented => "NotImplemented",
        };
        f.write_str(label)
    }
}

/// An error surfaced by the execution core, carrying its kind and a
/// human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    #[must_use]
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConstraintViolation, message)
    }

    #[must_use]
    pub fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted, "query was cancelled or timed out")
    }

    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    #[must_use]
    pub fn buffer_manager(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BufferManager, message)
    }

    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transaction, message)
    }

    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Catalog, message)
    }

    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::Interrupted)
    }
}

/// Result alias used throughout the execution core.
pub type Result<T> = std::result::Result<T, ExecError>;
