use std::io;
use thiserror::Error;

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a discovery run.
///
/// None of these are recoverable within a run: the driver aborts and reports no dependencies
/// rather than handing back a cover whose minimality it can no longer vouch for.
#[derive(Debug, Error)]
pub enum Error {
    /// The relation has more rows than a row id can address.
    #[error("relation has more than {limit} rows; row ids would overflow")]
    TooManyRows {
        /// The largest supported number of rows.
        limit: usize,
    },

    /// A row had a different number of cells than the relation has columns.
    #[error("row {row} has {found} cells but the relation has {expected} columns")]
    RowWidth {
        /// Zero-based index of the offending row.
        row: usize,
        /// Number of columns in the relation.
        expected: usize,
        /// Number of cells actually found.
        found: usize,
    },

    /// Input could not be decoded into cells.
    #[error("invalid input data: {0}")]
    InvalidData(String),

    /// The underlying reader failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine caught itself in an inconsistent state. This is a bug, not a property of the
    /// input.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        Error::InvalidData(msg.into())
    }
}
