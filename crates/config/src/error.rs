//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// File extension is not one of toml, yaml/yml or json
    #[display("unsupported config format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Layers could not be merged or extracted into a [`Config`](crate::Config)
    #[display("invalid configuration")]
    Invalid,
    /// Values parsed but break a cross-field rule
    #[display("invalid configuration: {_0}")]
    Validation(#[error(not(source))] String),
}

impl ErrorKind {
    /// Configuration errors never go away on their own.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
