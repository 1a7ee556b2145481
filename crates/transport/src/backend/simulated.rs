//! Simulated upload transport for testing and demos.

use super::{TransportEvent, TransportEventStream};
use crate::UploadTransport;
use crate::descriptor::{RawUploadedFile, UploadedFile};
use crate::error::{ErrorKind, Result};
use crate::file::{BoxAsyncRead, LocalFile};
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

const PROGRESS_STEP: u8 = 10;

/// What the simulated service does with the next file it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Store the file and report its `url`.
    Complete,
    /// Store the file but report the location only as `ufsUrl`.
    LegacyUrl,
    /// Store the file but report no location at all.
    MissingUrl,
    /// Abort the whole batch with the given reason.
    Fail(String),
}

/// Upload transport that keeps stored objects in memory.
///
/// Progress advances by a fixed step on every tick of a timer, the way a
/// progress bar is faked when the real service reports no progress. Each
/// file consumes the next scripted [`Outcome`]; once the script runs out
/// every file completes.
///
/// # Examples
///
/// ```
/// use filedeck_transport::{LocalFile, Outcome, SimulatedTransport, TransportEvent, UploadTransport};
/// use futures::TryStreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = SimulatedTransport::default().with_script([Outcome::MissingUrl]);
/// let files = [LocalFile::in_memory("a.png", "image/png", b"png".as_slice())];
/// let events: Vec<_> = transport.begin_upload("imageUploader", &files).try_collect().await.map_err(|e| format!("{e:?}"))?;
/// assert!(matches!(events.last(), Some(TransportEvent::Complete(done)) if done[0].url.is_none()));
/// # Ok(())
/// # }
/// ```
///
/// Reported URLs are `https://cdn.example/<file name>`; a later upload of the
/// same name replaces the earlier object.
pub struct SimulatedTransport {
    base_url: String,
    tick: Duration,
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    removed: Mutex<Vec<String>>,
    objects: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.example/".to_string(),
            tick: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
            objects: Mutex::new(HashMap::new()),
        }
    }
}

impl SimulatedTransport {
    /// Delay between progress steps. Defaults to zero.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_script(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..self
        }
    }

    /// Number of batches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs passed to [`remove()`](UploadTransport::remove), in call order.
    pub async fn removed(&self) -> Vec<String> {
        self.removed.lock().await.clone()
    }

    fn location(&self, file: &LocalFile) -> String {
        format!("{}{}", self.base_url, file.name())
    }

    async fn store(&self, file: &LocalFile) -> Result<()> {
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
        file.open().await?.read_to_end(&mut bytes).await.map_err(ErrorKind::Io)?;
        self.objects.lock().await.insert(self.location(file), bytes.into());
        Ok(())
    }

    fn descriptor(&self, file: &LocalFile, outcome: &Outcome) -> UploadedFile {
        let location = self.location(file);
        let (url, ufs_url) = match outcome {
            Outcome::LegacyUrl => (None, Some(location)),
            Outcome::MissingUrl => (None, None),
            _ => (Some(location), None),
        };
        UploadedFile::from(RawUploadedFile {
            name: file.name().to_string(),
            size: file.size(),
            mime_type: file.mime_type().to_string(),
            url,
            ufs_url,
        })
    }
}

#[async_trait]
impl UploadTransport for SimulatedTransport {
    fn name(&self) -> &str {
        "simulated"
    }

    fn begin_upload<'a>(&'a self, route: &'a str, files: &'a [LocalFile]) -> TransportEventStream<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(stream! {
            tracing::debug!(transport = "simulated", route, files = files.len(), "Starting batch");
            let mut stored = Vec::with_capacity(files.len());
            for file in files {
                let outcome = self.script.lock().await.pop_front().unwrap_or(Outcome::Complete);
                yield Ok(TransportEvent::Begin { file_name: file.name().to_string() });
                if let Outcome::Fail(reason) = outcome {
                    yield Err(exn::Exn::from(ErrorKind::Rejected(reason)));
                    return;
                }
                let mut progress = 0u8;
                while progress < 100 {
                    tokio::time::sleep(self.tick).await;
                    progress = progress.saturating_add(PROGRESS_STEP).min(100);
                    yield Ok(TransportEvent::Progress(progress));
                }
                if let Err(e) = self.store(file).await {
                    yield Err(e);
                    return;
                }
                stored.push(self.descriptor(file, &outcome));
            }
            yield Ok(TransportEvent::Complete(stored));
        })
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        self.removed.lock().await.push(url.to_string());
        Ok(self.objects.lock().await.remove(url).is_some())
    }

    async fn open(&self, url: &str) -> Result<BoxAsyncRead> {
        let bytes = self.objects.lock().await.get(url).cloned();
        let bytes = bytes.ok_or_raise(|| ErrorKind::NotFound(url.into()))?;
        Ok(Box::pin(Cursor::new(bytes)))
    }
}
