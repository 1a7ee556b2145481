//! Per-user file manager core.
//!
//! Three components sit on top of an injected [`Session`]:
//! - [`MetadataClient`] scopes every store operation to the signed-in
//!   principal,
//! - [`Uploader`] runs a selection through route validation, the transport
//!   and the client, streaming [`UploadEvent`]s,
//! - [`FileList`] holds the principal's records for display and applies
//!   upload-complete and delete events to them,
//! - [`Downloader`] opens a principal's stored file for reading.

mod client;
mod display;
mod download;
pub mod error;
mod list;
mod session;
mod upload;

pub use crate::client::MetadataClient;
pub use crate::display::{FileKind, format_size};
pub use crate::download::Downloader;
pub use crate::list::FileList;
pub use crate::session::{Session, SessionHandle, SessionRef};
pub use crate::upload::{Selection, UploadEvent, UploadState, Uploader};
