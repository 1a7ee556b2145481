//! Upload transport trait and implementations.
//!
//! A transport moves the bytes of a batch of local files somewhere they can
//! be retrieved from, reporting progress along the way, and hands back one
//! descriptor per stored file. Stored objects can be read back or removed by
//! URL. It knows nothing about owners or metadata.

mod local;
#[cfg(feature = "mock")]
mod simulated;

pub use self::local::LocalTransport;
#[cfg(feature = "mock")]
pub use self::simulated::{Outcome, SimulatedTransport};
use crate::descriptor::UploadedFile;
use crate::error::Result;
use crate::file::{BoxAsyncRead, LocalFile};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type TransportEventStream<'a> = Pin<Box<dyn Stream<Item = Result<TransportEvent>> + Send + 'a>>;

/// Notifications emitted while a batch is transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transfer of one file is starting.
    Begin { file_name: String },
    /// Percentage (0-100) of the current file transferred so far.
    Progress(u8),
    /// Every file in the batch has been stored. Emitted once, last.
    Complete(Vec<UploadedFile>),
}

/// Unified interface for upload transports.
///
/// # Event order
/// For each file: one `Begin`, then zero or more non-decreasing `Progress`
/// values. After the last file, a single `Complete` carries a descriptor
/// for every file, in selection order. An `Err` item aborts the batch and
/// is always the final item; nothing from a failed batch is reported as
/// stored.
///
/// # Examples
///
/// ```no_run
/// use filedeck_transport::{LocalFile, TransportEvent, UploadTransport, error::Result};
/// use futures::TryStreamExt;
///
/// async fn upload_urls(transport: &dyn UploadTransport, files: &[LocalFile]) -> Result<Vec<Option<String>>> {
///     let mut events = transport.begin_upload("fileUploader", files);
///     while let Some(event) = events.try_next().await? {
///         if let TransportEvent::Complete(done) = event {
///             return Ok(done.into_iter().map(|f| f.url).collect());
///         }
///     }
///     Ok(Vec::new())
/// }
/// ```
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Name of the transport (used for logging only).
    fn name(&self) -> &str;

    /// Start transferring `files` under the named route.
    ///
    /// Route limits are enforced by the caller before this is invoked.
    fn begin_upload<'a>(&'a self, route: &'a str, files: &'a [LocalFile]) -> TransportEventStream<'a>;

    /// Delete a previously transferred object by its retrieval URL.
    ///
    /// Returns `false` if there was nothing at that URL.
    async fn remove(&self, url: &str) -> Result<bool>;

    /// Open a previously transferred object for reading by its retrieval URL.
    async fn open(&self, url: &str) -> Result<BoxAsyncRead>;
}
