//! Upload transports for filedeck.
//!
//! A transport is the external collaborator that moves file bytes, reports
//! where they ended up, and reads them back. This crate holds:
//! - the [`UploadTransport`] trait and its event stream,
//! - upload [routes](RouteTable) with per-category size and count limits,
//! - normalization of completion payloads into [`UploadedFile`],
//! - a content-addressed [`LocalTransport`], and a `SimulatedTransport`
//!   behind the `mock` feature.

pub mod backend;
mod descriptor;
pub mod error;
mod file;
mod path;
mod route;
mod size;

#[cfg(feature = "mock")]
pub use crate::backend::{Outcome, SimulatedTransport};
pub use crate::backend::{LocalTransport, TransportEvent, UploadTransport};
pub use crate::descriptor::{RawUploadedFile, UploadedFile};
pub use crate::file::{BoxAsyncRead, LocalFile};
pub use crate::path::validate as validate_key;
pub use crate::route::{Category, Limits, Route, RouteTable};
pub use crate::size::ByteSize;
use std::sync::Arc;

pub type TransportHandle = Arc<dyn UploadTransport + Send + Sync>;
