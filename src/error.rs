//! Error types for megalista_reader.
//!
//! All errors that can occur while reading rows are represented by [`ReaderError`].
//! Errors are propagated via `Result<T, ReaderError>` throughout the crate and
//! handed to the surrounding pipeline unchanged; nothing here retries.
//!
//! # Error Classification
//!
//! - **Usage** — the execution does not fit this stage (wrong source type,
//!   missing metadata, unusable table identifier). Raised before any query.
//! - **Config** — the reader configuration could not be loaded or is invalid.
//! - **Output** — emitted rows could not be written by the driver.
//! - **Warehouse** — anything the warehouse client reports: connection, auth,
//!   missing tables, SQL errors, failures while paging. The original error is
//!   kept as the source.

use std::fmt;

use crate::execution::SourceType;

/// Boxed error as reported by a warehouse client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    // ── Usage errors — raised before any query ───────────────────────────
    /// The execution's source is not a warehouse table.
    #[error("unsupported source type: {0}")]
    UnsupportedSourceType(SourceType),

    /// The source metadata does not name both a dataset and a table.
    #[error("malformed source metadata: expected at least {expected} elements, found {found}")]
    MalformedMetadata { expected: usize, found: usize },

    /// A dataset or table identifier cannot be quoted safely.
    #[error("invalid table identifier: {0:?}")]
    InvalidIdentifier(String),

    /// An unknown name was given for an enumerated value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ── Configuration errors ─────────────────────────────────────────────
    /// The configuration file or an override is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ────────────────────────────────────────────────────
    /// Emitted rows could not be written.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    // ── Warehouse errors — propagated unchanged ──────────────────────────
    /// The warehouse client failed to connect, run the query or fetch a page.
    #[error("warehouse error: {0}")]
    Warehouse(#[source] BoxError),
}

/// Classification of an error for logging and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderErrorKind {
    Usage,
    Config,
    Output,
    Warehouse,
}

impl fmt::Display for ReaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderErrorKind::Usage => write!(f, "USAGE"),
            ReaderErrorKind::Config => write!(f, "CONFIG"),
            ReaderErrorKind::Output => write!(f, "OUTPUT"),
            ReaderErrorKind::Warehouse => write!(f, "WAREHOUSE"),
        }
    }
}

impl ReaderError {
    /// Wrap any client error as a warehouse failure.
    pub fn warehouse(err: impl Into<BoxError>) -> Self {
        ReaderError::Warehouse(err.into())
    }

    /// Classify the error.
    pub fn kind(&self) -> ReaderErrorKind {
        match self {
            ReaderError::UnsupportedSourceType(_)
            | ReaderError::MalformedMetadata { .. }
            | ReaderError::InvalidIdentifier(_)
            | ReaderError::InvalidArgument(_) => ReaderErrorKind::Usage,

            ReaderError::InvalidConfig(_) | ReaderError::ConfigIo { .. } => {
                ReaderErrorKind::Config
            }

            ReaderError::Output(_) => ReaderErrorKind::Output,

            ReaderError::Warehouse(_) => ReaderErrorKind::Warehouse,
        }
    }
}

impl From<postgres::Error> for ReaderError {
    fn from(err: postgres::Error) -> Self {
        ReaderError::Warehouse(Box::new(err))
    }
}
