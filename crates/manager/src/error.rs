//! Manager Error Types
//!
//! Every failure a user can see while uploading, listing or deleting files.
//! Errors from the store and transport crates are kept as children in the
//! `exn` error tree under [`ErrorKind::Store`] and [`ErrorKind::Transport`].

use derive_more::{Display, Error};
use filedeck_store::FileId;
use filedeck_transport::{ByteSize, Category};

/// A manager error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Session Errors
/// - [`ErrorKind::Unauthenticated`]
///
/// ### Validation Errors
/// Raised before any byte is transferred.
/// - [`ErrorKind::EmptySelection`]
/// - [`ErrorKind::UnknownRoute`]
/// - [`ErrorKind::UnsupportedType`]
/// - [`ErrorKind::FileTooLarge`]
/// - [`ErrorKind::TooManyFiles`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Transport`]
/// - [`ErrorKind::MissingUrl`]
/// - [`ErrorKind::Store`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No principal is signed in.
    #[display("not signed in")]
    Unauthenticated,
    #[display("{name} is {size} bytes, over the {limit} limit for {category} files")]
    FileTooLarge {
        name: String,
        size: u64,
        limit: ByteSize,
        category: Category,
    },
    /// The transport stored a file but reported no location for it.
    #[display("upload of {_0} completed without a url")]
    MissingUrl(#[error(not(source))] String),
    #[display("upload transport failed")]
    Transport,
    #[display("metadata store failed")]
    Store,
    /// Another batch is still in flight on this uploader.
    #[display("an upload is already in progress")]
    Busy,
    #[display("{name} has type `{mime_type}`, which route {route} does not accept")]
    UnsupportedType { name: String, mime_type: String, route: String },
    #[display("route {route} accepts at most {max} {category} file(s)")]
    TooManyFiles { route: String, category: Category, max: u32 },
    #[display("unknown upload route: {_0}")]
    UnknownRoute(#[error(not(source))] String),
    #[display("no files selected")]
    EmptySelection,
    #[display("file not found: {_0}")]
    NotFound(#[error(not(source))] FileId),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing in this crate retries on its own; this only tells the caller
    /// whether offering a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::Store | Self::Busy)
    }
}
