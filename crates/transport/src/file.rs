//! Local files queued for upload.

use crate::error::{ErrorKind, Result};
use crate::route::Category;
use exn::OptionExt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Byte source for an object being read.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone)]
enum Content {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file picked or dropped by the user, not yet transferred.
///
/// Name, size and MIME type are captured when the file is selected; the
/// bytes are read only once the transport opens it.
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    size: u64,
    mime_type: String,
    content: Content,
}

impl LocalFile {
    /// Describe a file on disk. The MIME type is guessed from the extension
    /// and left empty when unknown.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_raise(|| ErrorKind::NotFound(path.to_path_buf()))?;
        let mime_type = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string()).unwrap_or_default();
        Ok(Self {
            name,
            size: metadata.len(),
            mime_type,
            content: Content::Path(path.to_path_buf()),
        })
    }

    /// Describe a file whose bytes are already in memory (drops, tests).
    pub fn in_memory(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            content: Content::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn category(&self) -> Category {
        Category::from_mime(&self.mime_type)
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    pub(crate) async fn open(&self) -> Result<BoxAsyncRead> {
        match &self.content {
            Content::Path(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
                Ok(Box::pin(file))
            },
            Content::Memory(bytes) => Ok(Box::pin(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_all(file: &LocalFile) -> Vec<u8> {
        let mut buffer = Vec::new();
        file.open().await.unwrap().read_to_end(&mut buffer).await.unwrap();
        buffer
    }

    #[tokio::test]
    async fn test_from_path_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        tokio::fs::write(&path, b"%PDF-1.7").await.unwrap();
        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.name(), "Report.PDF");
        assert_eq!(file.size(), 8);
        assert_eq!(file.mime_type(), "application/pdf");
        assert_eq!(file.category(), Category::Pdf);
        assert_eq!(file.extension().as_deref(), Some("pdf"));
        assert_eq!(read_all(&file).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_unknown_extension_has_empty_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.zzunknown");
        tokio::fs::write(&path, b"x").await.unwrap();
        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.mime_type(), "");
        assert_eq!(file.category(), Category::Blob);
    }

    #[tokio::test]
    async fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFile::from_path(dir.path().join("missing.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        // Directories are not uploadable either.
        assert!(LocalFile::from_path(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory() {
        let file = LocalFile::in_memory("a.png", "image/png", vec![1u8, 2, 3]);
        assert_eq!(file.size(), 3);
        assert_eq!(read_all(&file).await, [1, 2, 3]);
    }
}
