//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("I/O error")]
    Io,
    /// The record handed to the store breaks a field invariant (empty name,
    /// empty URL, size out of range).
    #[display("invalid record: {_0}")]
    InvalidRecord(#[error(not(source))] &'static str),
    /// A stored row could not be turned back into a model.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Backend refused the write (used by the mock to simulate outages).
    #[display("store unavailable")]
    Unavailable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Io | Self::Unavailable)
    }
}
