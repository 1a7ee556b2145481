//! Local filesystem upload transport.
//!
//! Each file is streamed to a temporary name under the root while being
//! hashed, then renamed to `<blake3>-<transfer id>.<ext>`. The
//! public URL of an object is the configured base URL joined with that key.

use super::{TransportEvent, TransportEventStream};
use crate::UploadTransport;
use crate::descriptor::UploadedFile;
use crate::error::{ErrorKind, Result};
use crate::file::{BoxAsyncRead, LocalFile};
use crate::path::validate as validate_key;
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem upload transport.
///
/// # Examples
///
/// ```no_run
/// use filedeck_transport::LocalTransport;
/// use url::Url;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let public = Url::parse("https://files.example.com/objects/")?;
/// let transport = LocalTransport::new("/srv/filedeck/objects", public).map_err(|e| format!("{e:?}"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalTransport {
    name: String,
    root: PathBuf,
    public_url: Url,
    chunk_size: usize,
}

impl LocalTransport {
    /// Create a transport storing objects under `root` and serving them from
    /// `public_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not absolute, exists but is not a
    /// directory, or `public_url` cannot be used as a base URL.
    pub fn new(root: impl AsRef<Path>, public_url: Url) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it only happens once at startup.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }
        if public_url.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(public_url.to_string()));
        }
        let mut public_url = public_url;
        if !public_url.path().ends_with('/') {
            let path = format!("{}/", public_url.path());
            public_url.set_path(&path);
        }
        Ok(Self {
            name: "local".to_string(),
            root,
            public_url,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Create a transport whose public URLs are `file://` URLs into `root`.
    pub fn with_file_urls(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let public_url = Url::from_directory_path(root)
            .map_err(|()| ErrorKind::InvalidUrl(format!("file://{}", root.display())))?;
        Self::new(root, public_url)
    }

    /// Bytes copied between progress events.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    fn url_for(&self, key: &str) -> Result<Url> {
        self.public_url.join(key).or_raise(|| ErrorKind::InvalidUrl(key.to_string()))
    }

    /// Map a public URL back to the object key it was built from.
    fn key_for(&self, url: &str) -> Result<PathBuf> {
        let key = url
            .strip_prefix(self.public_url.as_str())
            .ok_or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        validate_key(key)
    }

    async fn start(&self, file: &LocalFile) -> Result<PartialObject> {
        let reader = file.open().await?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let temp = self.root.join(format!(".partial-{id}"));
        let writer = fs::File::create(&temp).await.map_err(|e| ErrorKind::from_io(e, &temp))?;
        Ok(PartialObject {
            reader,
            writer,
            id,
            temp,
            committed: false,
            hasher: blake3::Hasher::new(),
            copied: 0,
            total: file.size(),
            buffer: vec![0; self.chunk_size],
        })
    }

    async fn finish(&self, mut partial: PartialObject, file: &LocalFile) -> Result<UploadedFile> {
        partial.writer.flush().await.map_err(|e| ErrorKind::from_io(e, &partial.temp))?;
        // Every transfer gets its own object, even for identical content, so
        // removing one upload never takes another one's bytes with it.
        let hash = partial.hasher.finalize().to_hex();
        let key = match file.extension() {
            Some(ext) => format!("{hash}-{}.{ext}", partial.id),
            None => format!("{hash}-{}", partial.id),
        };
        let target = self.root.join(validate_key(&key)?);
        fs::rename(&partial.temp, &target).await.map_err(|e| ErrorKind::from_io(e, &target))?;
        partial.committed = true;
        let url = self.url_for(&key)?;
        tracing::debug!(transport = %self.name, file = file.name(), key = %key, bytes = partial.copied, "Stored object");
        Ok(UploadedFile {
            name: file.name().to_string(),
            size: partial.copied,
            mime_type: file.mime_type().to_string(),
            url: Some(url.into()),
        })
    }
}

/// An object being streamed to its temporary location.
///
/// The temporary file is removed on drop unless the object was committed,
/// which covers failed transfers and event streams dropped mid-file.
struct PartialObject {
    reader: BoxAsyncRead,
    writer: fs::File,
    id: String,
    temp: PathBuf,
    committed: bool,
    hasher: blake3::Hasher,
    copied: u64,
    total: u64,
    buffer: Vec<u8>,
}
impl PartialObject {
    /// Copy one chunk. Returns the number of bytes copied, `0` at EOF.
    async fn copy_chunk(&mut self) -> Result<usize> {
        let read = self.reader.read(&mut self.buffer).await.map_err(ErrorKind::Io)?;
        if read > 0 {
            let chunk = &self.buffer[..read];
            self.hasher.update(chunk);
            self.writer.write_all(chunk).await.map_err(|e| ErrorKind::from_io(e, &self.temp))?;
            self.copied += read as u64;
        }
        Ok(read)
    }

    fn percent(&self) -> u8 {
        match self.total {
            0 => 100,
            total => (self.copied.min(total) * 100 / total) as u8,
        }
    }
}
impl Drop for PartialObject {
    fn drop(&mut self) {
        if !self.committed {
            _ = std::fs::remove_file(&self.temp);
        }
    }
}

#[async_trait]
impl UploadTransport for LocalTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_upload<'a>(&'a self, route: &'a str, files: &'a [LocalFile]) -> TransportEventStream<'a> {
        Box::pin(stream! {
            tracing::debug!(transport = %self.name, route, files = files.len(), "Starting batch");
            let mut stored = Vec::with_capacity(files.len());
            for file in files {
                yield Ok(TransportEvent::Begin { file_name: file.name().to_string() });
                let mut partial = match self.start(file).await {
                    Ok(partial) => partial,
                    Err(e) => { yield Err(e); return; },
                };
                let mut reported = 0u8;
                loop {
                    match partial.copy_chunk().await {
                        Ok(0) => break,
                        Ok(_) => {
                            let percent = partial.percent();
                            if percent > reported {
                                reported = percent;
                                yield Ok(TransportEvent::Progress(percent));
                            }
                        },
                        Err(e) => {
                            drop(partial);
                            yield Err(e);
                            return;
                        },
                    }
                }
                match self.finish(partial, file).await {
                    Ok(done) => stored.push(done),
                    Err(e) => { yield Err(e); return; },
                }
            }
            yield Ok(TransportEvent::Complete(stored));
        })
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        let key = self.key_for(url)?;
        let path = self.root.join(&key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(exn::Exn::from(ErrorKind::from_io(e, path))),
        }
    }

    async fn open(&self, url: &str) -> Result<BoxAsyncRead> {
        let key = self.key_for(url)?;
        let path = self.root.join(&key);
        let file = fs::File::open(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        Ok(Box::pin(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};

    fn transport(dir: &tempfile::TempDir) -> LocalTransport {
        let public = Url::parse("https://files.example.com/objects").unwrap();
        LocalTransport::new(dir.path(), public).unwrap()
    }

    async fn collect(transport: &LocalTransport, files: &[LocalFile]) -> Vec<TransportEvent> {
        transport.begin_upload("fileUploader", files).try_collect().await.unwrap()
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let public = Url::parse("https://files.example.com/").unwrap();
        assert!(LocalTransport::new("relative/path", public.clone()).is_err());
        assert!(LocalTransport::new("./relative", public).is_err());
    }

    #[test]
    fn test_public_url_gets_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        assert_eq!(transport.public_url().as_str(), "https://files.example.com/objects/");
    }

    #[test]
    fn test_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::with_file_urls(dir.path()).unwrap();
        assert_eq!(transport.public_url().scheme(), "file");
        assert!(transport.public_url().as_str().ends_with('/'));
    }

    #[tokio::test]
    async fn test_upload_batch() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        let files = [
            LocalFile::in_memory("a.PNG", "image/png", b"png bytes".as_slice()),
            LocalFile::in_memory("notes", "", b"text".as_slice()),
        ];
        let events = collect(&transport, &files).await;

        assert_eq!(events[0], TransportEvent::Begin { file_name: "a.PNG".to_string() });
        let Some(TransportEvent::Complete(done)) = events.last() else {
            panic!("batch did not complete: {events:?}");
        };
        assert_eq!(done.len(), 2);

        let url = done[0].url.as_deref().unwrap();
        let png_key = url.strip_prefix("https://files.example.com/objects/").unwrap();
        assert!(png_key.starts_with(&format!("{}-", blake3::hash(b"png bytes").to_hex())));
        assert!(png_key.ends_with(".png"));
        assert_eq!(done[0].size, 9);
        assert_eq!(done[0].mime_type, "image/png");
        assert_eq!(tokio::fs::read(dir.path().join(png_key)).await.unwrap(), b"png bytes");

        let notes_key = done[1].url.as_deref().unwrap().strip_prefix("https://files.example.com/objects/").unwrap();
        assert!(notes_key.starts_with(&format!("{}-", blake3::hash(b"text").to_hex())));
        assert!(!notes_key.contains('.'));
        assert!(dir.path().join(notes_key).exists());
    }

    #[tokio::test]
    async fn test_identical_content_is_stored_separately() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        let files = [
            LocalFile::in_memory("alice.png", "image/png", b"same bytes".as_slice()),
            LocalFile::in_memory("bob.png", "image/png", b"same bytes".as_slice()),
        ];
        let events = collect(&transport, &files).await;
        let Some(TransportEvent::Complete(done)) = events.last() else {
            panic!("batch did not complete");
        };
        let first = done[0].url.clone().unwrap();
        let second = done[1].url.clone().unwrap();
        assert_ne!(first, second);

        assert!(transport.remove(&first).await.unwrap());
        let mut contents = Vec::new();
        transport.open(&second).await.unwrap().read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"same bytes");
    }

    #[tokio::test]
    async fn test_dropped_stream_leaves_no_partial_object() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir).with_chunk_size(4);
        let files = [LocalFile::in_memory("big.bin", "", vec![7u8; 64])];
        {
            let mut events = transport.begin_upload("fileUploader", &files);
            assert!(matches!(events.next().await, Some(Ok(TransportEvent::Begin { .. }))));
            assert!(matches!(events.next().await, Some(Ok(TransportEvent::Progress(_)))));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_open() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        let files = [LocalFile::in_memory("a.txt", "text/plain", b"hello".as_slice())];
        let events = collect(&transport, &files).await;
        let Some(TransportEvent::Complete(done)) = events.last() else {
            panic!("batch did not complete");
        };
        let url = done[0].url.clone().unwrap();

        let mut contents = String::new();
        transport.open(&url).await.unwrap().read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello");

        transport.remove(&url).await.unwrap();
        let err = transport.open(&url).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(transport.open("https://evil.example/a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_progress_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir).with_chunk_size(4);
        let files = [LocalFile::in_memory("ten.bin", "", b"0123456789".as_slice())];
        let progress: Vec<u8> = collect(&transport, &files)
            .await
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [40, 80, 100]);
    }

    #[tokio::test]
    async fn test_unreadable_file_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let path = source.path().join("gone.png");
        tokio::fs::write(&path, b"data").await.unwrap();
        let file = LocalFile::from_path(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let transport = transport(&dir);
        let files = [file];
        let results: Vec<_> = transport.begin_upload("fileUploader", &files).collect::<Vec<_>>().await;
        assert!(matches!(results.last(), Some(Err(_))));
        assert!(!results.iter().any(|r| matches!(r, Ok(TransportEvent::Complete(_)))));
        // No partial objects left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        let files = [LocalFile::in_memory("a.png", "image/png", b"png".as_slice())];
        let events = collect(&transport, &files).await;
        let Some(TransportEvent::Complete(done)) = events.last() else {
            panic!("batch did not complete");
        };
        let url = done[0].url.clone().unwrap();

        assert!(transport.remove(&url).await.unwrap());
        assert!(!transport.remove(&url).await.unwrap());
        // URLs from elsewhere are rejected rather than mapped onto the root.
        assert!(transport.remove("https://evil.example/a.png").await.is_err());
        assert!(transport.remove("https://files.example.com/objects/../secret").await.is_err());
    }
}
