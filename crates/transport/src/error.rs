//! Transport Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Local file does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied reading the local file or writing the object
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Object key contains invalid characters or escapes the transport root
    #[display("invalid object key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    /// URL does not belong to this transport, or could not be built
    #[display("invalid url: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// Human-readable size could not be parsed
    #[display("invalid size: {_0}")]
    InvalidSize(#[error(not(source))] String),
    /// The remote side refused or aborted the transfer
    #[display("upload rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Rejected(_))
    }

    pub(crate) fn from_io(e: IoError, path: impl Into<PathBuf>) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(e),
        }
    }
}
