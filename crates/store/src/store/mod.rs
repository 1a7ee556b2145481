//! Metadata store trait and implementations.
//!
//! This module defines the `MetadataStore` trait: a collection of file
//! documents that can only be reached through an owner. There is no way to
//! ask a store for "all files"; every read and every delete is filtered by
//! owner equality, and records are never updated in place.

#[cfg(feature = "mock")]
mod mock;
mod sqlite;

#[cfg(feature = "mock")]
pub use self::mock::MockStore;
pub use self::sqlite::SqliteStore;
use crate::error::Result;
use crate::models::{FileId, FileMetadata, NewFileRecord, PrincipalId};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type FileMetadataStream<'a> = Pin<Box<dyn Stream<Item = Result<FileMetadata>> + Send + 'a>>;

/// Unified interface for file metadata stores.
///
/// # Ordering
/// Listings are ordered newest-first by upload date. Records sharing a
/// timestamp come back in reverse insertion order.
///
/// # Examples
///
/// ```no_run
/// use filedeck_store::{MetadataStore, PrincipalId, error::Result};
///
/// async fn upload_count(store: &dyn MetadataStore, owner: &PrincipalId) -> Result<usize> {
///     Ok(store.list(owner).await?.len())
/// }
/// ```
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Name of the backing store (used for logging only).
    fn name(&self) -> &str;

    /// Append a record owned by `owner`.
    ///
    /// The store assigns the id and the upload timestamp. Returns
    /// [`InvalidRecord`](crate::error::ErrorKind::InvalidRecord) when the
    /// record breaks a field invariant; nothing is written in that case.
    async fn insert(&self, owner: &PrincipalId, record: &NewFileRecord) -> Result<FileId>;

    /// Stream every record owned by `owner`, newest first.
    ///
    /// Each call runs a fresh query; the stream cannot be restarted.
    fn list_stream<'a>(&'a self, owner: &'a PrincipalId) -> FileMetadataStream<'a>;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, owner: &PrincipalId) -> Result<Vec<FileMetadata>> {
        self.list_stream(owner).try_collect().await
    }

    /// Fetch a single record, provided `owner` owns it.
    async fn get(&self, owner: &PrincipalId, id: &FileId) -> Result<Option<FileMetadata>>;

    /// Remove a record, provided `owner` owns it.
    ///
    /// Returns `true` if a record was removed and `false` if there was
    /// nothing to remove (unknown id, or owned by someone else).
    async fn delete(&self, owner: &PrincipalId, id: &FileId) -> Result<bool>;
}
