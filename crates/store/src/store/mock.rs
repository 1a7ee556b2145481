//! In-memory metadata store for testing.

use super::FileMetadataStream;
use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::{FileId, FileMetadata, NewFileRecord, PrincipalId};
use async_stream::stream;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct Entry {
    seq: u64,
    id: FileId,
    owner: PrincipalId,
    record: NewFileRecord,
    /// `None` mirrors a row written without a server timestamp.
    uploaded_at: Option<OffsetDateTime>,
}

/// In-memory metadata store for testing.
///
/// Records live in a `Vec` behind a [`RwLock`] and are ordered exactly like
/// [`SqliteStore`](super::SqliteStore) orders them: missing timestamps first,
/// then newest first, then reverse insertion order. Writes can be switched
/// off to simulate an outage.
///
/// # Examples
///
/// ```
/// use filedeck_store::{MetadataStore, MockStore, NewFileRecord, PrincipalId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::default();
/// let owner = PrincipalId::from("user-1");
/// let record = NewFileRecord::new("a.png", 10, "image/png", "https://cdn.example/a.png");
/// store.insert(&owner, &record).await.map_err(|e| format!("{e:?}"))?;
/// assert_eq!(store.len().await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockStore {
    entries: RwLock<Vec<Entry>>,
    next_seq: AtomicU64,
    fail_writes: AtomicBool,
}

impl MockStore {
    /// Make every subsequent `insert` and `delete` fail with
    /// [`ErrorKind::Unavailable`].
    pub fn with_failing_writes(self) -> Self {
        self.set_failing_writes(true);
        self
    }

    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Total number of records, across all owners.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insert a record with an explicit timestamp, bypassing validation.
    ///
    /// Pass `None` to mimic a record that the backend has not stamped yet.
    pub async fn insert_raw(
        &self,
        owner: &PrincipalId,
        record: NewFileRecord,
        uploaded_at: Option<OffsetDateTime>,
    ) -> FileId {
        let id = FileId::generate();
        self.entries.write().await.push(Entry {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            id: id.clone(),
            owner: owner.clone(),
            record,
            uploaded_at,
        });
        id
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        Ok(())
    }

    fn to_metadata(entry: &Entry, now: OffsetDateTime) -> FileMetadata {
        FileMetadata::from_record(
            entry.id.clone(),
            entry.owner.clone(),
            entry.record.clone(),
            entry.uploaded_at.unwrap_or(now),
        )
    }
}

#[async_trait]
impl MetadataStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn insert(&self, owner: &PrincipalId, record: &NewFileRecord) -> Result<FileId> {
        self.check_writable()?;
        record.validate()?;
        Ok(self.insert_raw(owner, record.clone(), Some(OffsetDateTime::now_utc())).await)
    }

    fn list_stream<'a>(&'a self, owner: &'a PrincipalId) -> FileMetadataStream<'a> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let files: Vec<FileMetadata> = {
                let guard = self.entries.read().await;
                let mut owned: Vec<&Entry> = guard.iter().filter(|e| &e.owner == owner).collect();
                owned.sort_by_key(|e| (e.uploaded_at.is_some(), Reverse(e.uploaded_at), Reverse(e.seq)));
                let now = OffsetDateTime::now_utc();
                owned.into_iter().map(|e| Self::to_metadata(e, now)).collect()
            };
            for file in files {
                yield Ok(file);
            }
        })
    }

    async fn get(&self, owner: &PrincipalId, id: &FileId) -> Result<Option<FileMetadata>> {
        let guard = self.entries.read().await;
        let now = OffsetDateTime::now_utc();
        Ok(guard.iter().find(|e| &e.owner == owner && &e.id == id).map(|e| Self::to_metadata(e, now)))
    }

    async fn delete(&self, owner: &PrincipalId, id: &FileId) -> Result<bool> {
        self.check_writable()?;
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|e| !(&e.owner == owner && &e.id == id));
        Ok(guard.len() < before)
    }
}
