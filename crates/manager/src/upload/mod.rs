//! Upload orchestration.
//!
//! Turns a picked or dropped selection into one transport batch, then writes
//! one metadata record per stored file. The primary entry point is
//! [`Uploader::upload`], which streams [`UploadEvent`]s; the coarse
//! [`UploadState`] is observable separately through a `watch` channel.
//!
//! A batch that fails validation never reaches the transport. A file the
//! transport stored but could not persist metadata for is left where it is
//! (an orphan) and logged; nothing is rolled back and nothing is retried.

mod validate;

use self::validate::validate_selection;
use crate::client::MetadataClient;
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use filedeck_store::{FileMetadata, NewFileRecord};
use filedeck_transport::{LocalFile, RouteTable, TransportEvent, TransportHandle, UploadedFile};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// How a selection reached the uploader.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Chosen through a file picker.
    Picker(Vec<LocalFile>),
    /// Dropped onto the drop zone.
    Drop(Vec<LocalFile>),
}
impl Selection {
    fn source(&self) -> &'static str {
        match self {
            Self::Picker(_) => "picker",
            Self::Drop(_) => "drop",
        }
    }

    fn into_files(self) -> Vec<LocalFile> {
        match self {
            Self::Picker(files) | Self::Drop(files) => files,
        }
    }
}

/// Coarse state of the current batch.
///
/// `Done` and `Failed` are reported when a batch ends; the state returns to
/// `Idle` once its event stream has been fully consumed or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Validating,
    Transferring {
        progress: u8,
    },
    Persisting,
    Done,
    Failed,
}
impl UploadState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Validating | Self::Transferring { .. } | Self::Persisting)
    }
}

/// Events emitted by [`Uploader::upload`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) and [`Progress`](Self::Progress), as the
///    transport begins and advances each file.
/// 2. [`Persisted`](Self::Persisted) once per file whose record was written.
///    Files that could not be persisted are yielded as `Err` items instead,
///    without ending the stream.
/// 3. [`Complete`](Self::Complete) exactly once, last.
///
/// A validation or transport error terminates the stream early, in which
/// case [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started { file_name: String },
    Progress(u8),
    Persisted(FileMetadata),
    Complete { persisted: usize, failed: usize },
}

/// Single-flight upload orchestrator.
pub struct Uploader {
    client: MetadataClient,
    transport: TransportHandle,
    routes: Arc<RouteTable>,
    state: watch::Sender<UploadState>,
    in_flight: AtomicBool,
}

impl Uploader {
    pub fn new(client: MetadataClient, transport: TransportHandle, routes: Arc<RouteTable>) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            client,
            transport,
            routes,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    /// Start uploading `selection` through the named route.
    ///
    /// Fails immediately with [`Busy`](ErrorKind::Busy) while another batch
    /// from this uploader is still streaming; the running batch is not
    /// affected. Dropping the returned stream abandons the batch.
    pub fn upload<'a>(
        &'a self,
        route: &'a str,
        selection: Selection,
    ) -> Result<impl Stream<Item = Result<UploadEvent>> + Send + 'a> {
        let guard = FlightGuard::acquire(&self.in_flight, &self.state)?;
        tracing::debug!(route, source = selection.source(), "Upload requested");
        let files = selection.into_files();

        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        Ok(stream!({
            guard.set(UploadState::Validating);
            if let Err(e) = validate_selection(&self.routes, route, &files) {
                guard.set(UploadState::Failed);
                yield Err(e);
                return;
            }

            let mut events = self.transport.begin_upload(route, &files);
            let mut stored = None;
            while let Some(event) = events.next().await {
                match event {
                    Ok(TransportEvent::Begin { file_name }) => {
                        guard.set(UploadState::Transferring { progress: 0 });
                        yield Ok(UploadEvent::Started { file_name });
                    },
                    Ok(TransportEvent::Progress(progress)) => {
                        let progress = progress.min(100);
                        guard.set(UploadState::Transferring { progress });
                        yield Ok(UploadEvent::Progress(progress));
                    },
                    Ok(TransportEvent::Complete(done)) => {
                        stored = Some(done);
                        break;
                    },
                    Err(e) => {
                        guard.set(UploadState::Failed);
                        yield Err(e.raise(ErrorKind::Transport));
                        return;
                    },
                }
            }
            drop(events);
            let Some(stored) = stored else {
                guard.set(UploadState::Failed);
                yield Err(exn::Exn::from(ErrorKind::Transport));
                return;
            };

            guard.set(UploadState::Persisting);
            let (mut persisted, mut failed) = (0, 0);
            for file in stored {
                match self.persist(route, file).await {
                    Ok(record) => {
                        persisted += 1;
                        yield Ok(UploadEvent::Persisted(record));
                    },
                    Err(e) => {
                        failed += 1;
                        yield Err(e);
                    },
                }
            }
            guard.set(if failed == 0 { UploadState::Done } else { UploadState::Failed });
            yield Ok(UploadEvent::Complete { persisted, failed });
        }))
    }

    async fn persist(&self, route: &str, file: UploadedFile) -> Result<FileMetadata> {
        let Some(url) = file.url else {
            tracing::warn!(route, name = %file.name, "Transport reported no url, not persisting");
            exn::bail!(ErrorKind::MissingUrl(file.name));
        };
        let record = NewFileRecord::new(file.name, file.size, file.mime_type, url);
        match self.client.create_for_display(record.clone()).await {
            Ok(stored) => {
                tracing::info!(route, id = %stored.id, name = %stored.name, bytes = stored.size, "Upload complete");
                Ok(stored)
            },
            Err(e) => {
                // The bytes are stored remotely but nothing points at them.
                tracing::warn!(route, url = %record.url, name = %record.name, "Orphaned upload: metadata write failed");
                Err(e)
            },
        }
    }
}

/// Holds the single-flight flag for the lifetime of one batch.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<UploadState>,
}
impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, state: &'a watch::Sender<UploadState>) -> Result<Self> {
        if flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            exn::bail!(ErrorKind::Busy);
        }
        Ok(Self { flag, state })
    }

    fn set(&self, state: UploadState) {
        self.state.send_replace(state);
    }
}
impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(UploadState::Idle);
        self.flag.store(false, Ordering::Release);
    }
}
