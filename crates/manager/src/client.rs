//! Metadata store client.
//!
//! Binds a [`MetadataStore`](filedeck_store::MetadataStore) to a session:
//! every call reads the current principal and scopes the store operation to
//! it. Reads are permissive (nobody signed in means nothing to see); writes
//! are strict (nobody signed in is an error, and nothing is written).

use crate::error::{ErrorKind, Result};
use crate::session::SessionRef;
use async_stream::stream;
use exn::{OptionExt, ResultExt};
use filedeck_store::{FileId, FileMetadata, NewFileRecord, PrincipalId, StoreHandle};
use futures::{Stream, StreamExt};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct MetadataClient {
    store: StoreHandle,
    session: SessionRef,
}

impl MetadataClient {
    pub fn new(store: StoreHandle, session: SessionRef) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    fn require_principal(&self) -> Result<PrincipalId> {
        self.session.principal().ok_or_raise(|| ErrorKind::Unauthenticated)
    }

    /// Persist a record owned by the current principal and return its id.
    pub async fn create(&self, record: &NewFileRecord) -> Result<FileId> {
        let owner = self.require_principal()?;
        self.insert(&owner, record).await
    }

    /// Persist a record and return it ready for display.
    ///
    /// The returned upload date is stamped locally, right after the store
    /// acknowledged the write; the stored date is the store's own.
    pub async fn create_for_display(&self, record: NewFileRecord) -> Result<FileMetadata> {
        let owner = self.require_principal()?;
        let id = self.insert(&owner, &record).await?;
        Ok(FileMetadata::from_record(id, owner, record, OffsetDateTime::now_utc()))
    }

    async fn insert(&self, owner: &PrincipalId, record: &NewFileRecord) -> Result<FileId> {
        let id = self.store.insert(owner, record).await.or_raise(|| ErrorKind::Store)?;
        tracing::debug!(store = self.store.name(), owner = %owner, id = %id, name = %record.name, "Created file record");
        Ok(id)
    }

    /// Every record of the current principal, newest first.
    ///
    /// Returns an empty list when nobody is signed in.
    pub async fn list(&self) -> Result<Vec<FileMetadata>> {
        let Some(owner) = self.session.principal() else {
            tracing::debug!("No principal signed in, listing nothing");
            return Ok(Vec::new());
        };
        self.store.list(&owner).await.or_raise(|| ErrorKind::Store)
    }

    /// Streaming variant of [`list()`](Self::list).
    pub fn list_stream(&self) -> impl Stream<Item = Result<FileMetadata>> + Send + '_ {
        stream! {
            let Some(owner) = self.session.principal() else {
                return;
            };
            let mut rows = self.store.list_stream(&owner);
            while let Some(row) = rows.next().await {
                yield row.or_raise(|| ErrorKind::Store);
            }
        }
    }

    /// A single record of the current principal.
    pub async fn get(&self, id: &FileId) -> Result<FileMetadata> {
        let Some(owner) = self.session.principal() else {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        };
        self.store
            .get(&owner, id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_raise(|| ErrorKind::NotFound(id.clone()))
    }

    /// Remove a record of the current principal.
    ///
    /// Removing an id that does not exist, or that belongs to someone else,
    /// succeeds without effect.
    pub async fn delete(&self, id: &FileId) -> Result<()> {
        let owner = self.require_principal()?;
        let removed = self.store.delete(&owner, id).await.or_raise(|| ErrorKind::Store)?;
        tracing::debug!(store = self.store.name(), owner = %owner, id = %id, removed, "Deleted file record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use filedeck_store::MockStore;
    use futures::TryStreamExt;
    use std::sync::Arc;

    fn client(session: &SessionHandle) -> (Arc<MockStore>, MetadataClient) {
        let store = Arc::new(MockStore::default());
        (store.clone(), MetadataClient::new(store, session.clone().into_ref()))
    }

    fn record(name: &str) -> NewFileRecord {
        NewFileRecord::new(name, 10, "image/png", format!("https://cdn.example/{name}"))
    }

    #[tokio::test]
    async fn test_anonymous_reads_are_empty() {
        let session = SessionHandle::new();
        let (store, client) = client(&session);
        store.insert_raw(&PrincipalId::from("alice"), record("a.png"), None).await;
        assert!(client.list().await.unwrap().is_empty());
        assert!(client.list_stream().try_collect::<Vec<_>>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_writes_fail() {
        let session = SessionHandle::new();
        let (store, client) = client(&session);
        let err = client.create(&record("a.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthenticated));
        let err = client.delete(&FileId::from("x")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthenticated));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let session = SessionHandle::signed_in("alice");
        let (_store, client) = client(&session);
        let id = client.create(&record("a.png")).await.unwrap();
        let files = client.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, id);
        assert!(files[0].matches(&record("a.png")));
        assert_eq!(client.get(&id).await.unwrap().name, "a.png");
    }

    #[tokio::test]
    async fn test_principals_are_isolated() {
        let session = SessionHandle::signed_in("alice");
        let (_store, client) = client(&session);
        let id = client.create(&record("alice.png")).await.unwrap();

        session.sign_in("bob");
        client.create(&record("bob.png")).await.unwrap();
        let names: Vec<_> = client.list().await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["bob.png"]);
        assert!(matches!(&*client.get(&id).await.unwrap_err(), ErrorKind::NotFound(_)));
        // Bob's delete of Alice's record is a silent no-op.
        client.delete(&id).await.unwrap();

        session.sign_in("alice");
        assert_eq!(client.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_ok() {
        let session = SessionHandle::signed_in("alice");
        let (_store, client) = client(&session);
        client.delete(&FileId::from("does-not-exist")).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_failures_are_wrapped() {
        let session = SessionHandle::signed_in("alice");
        let (store, client) = client(&session);
        store.set_failing_writes(true);
        let err = client.create(&record("a.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Store));
    }
}
