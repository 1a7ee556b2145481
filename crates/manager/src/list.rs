//! File list view-model.
//!
//! Owns the signed-in principal's records in display order (newest first)
//! plus the record open in the detail view, if any. The held sequence only
//! changes on load/refresh, on a completed upload, and on a successful
//! delete; filtering never touches it.

use crate::client::MetadataClient;
use crate::error::Result;
use filedeck_store::{FileId, FileMetadata};

pub struct FileList {
    client: MetadataClient,
    files: Vec<FileMetadata>,
    selected: Option<FileId>,
}

impl FileList {
    /// An empty list; call [`refresh()`](Self::refresh) to populate it.
    pub fn new(client: MetadataClient) -> Self {
        Self {
            client,
            files: Vec::new(),
            selected: None,
        }
    }

    /// Create the list and fetch the initial records.
    pub async fn load(client: MetadataClient) -> Result<Self> {
        let mut list = Self::new(client);
        list.refresh().await?;
        Ok(list)
    }

    /// Replace the held records with a fresh listing.
    ///
    /// On failure the previous records are kept.
    pub async fn refresh(&mut self) -> Result<()> {
        self.files = self.client.list().await?;
        if let Some(id) = &self.selected
            && self.position(id).is_none()
        {
            self.selected = None;
        }
        Ok(())
    }

    pub fn files(&self) -> &[FileMetadata] {
        &self.files
    }

    pub fn get(&self, id: &FileId) -> Option<&FileMetadata> {
        self.files.iter().find(|f| &f.id == id)
    }

    fn position(&self, id: &FileId) -> Option<usize> {
        self.files.iter().position(|f| &f.id == id)
    }

    /// Put a freshly persisted record at the top. No re-fetch.
    pub fn on_upload_complete(&mut self, record: FileMetadata) {
        self.files.insert(0, record);
    }

    /// Delete a record through the client, then drop it locally.
    ///
    /// If the delete fails the held records are left unchanged.
    pub async fn on_delete_requested(&mut self, id: &FileId) -> Result<()> {
        self.client.delete(id).await?;
        if let Some(index) = self.position(id) {
            self.files.remove(index);
        }
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        Ok(())
    }

    /// Records whose name contains `query`, ignoring case.
    pub fn filter(&self, query: &str) -> Vec<&FileMetadata> {
        let query = query.to_lowercase();
        self.files.iter().filter(|f| f.name.to_lowercase().contains(&query)).collect()
    }

    /// Open a record in the detail view. Unknown ids leave the selection as is.
    pub fn select(&mut self, id: &FileId) -> Option<&FileMetadata> {
        let index = self.position(id)?;
        self.selected = Some(id.clone());
        self.files.get(index)
    }

    pub fn selected(&self) -> Option<&FileMetadata> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Combined size of every held record, in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use filedeck_store::{MockStore, NewFileRecord, PrincipalId};
    use std::sync::Arc;
    use time::{Duration, OffsetDateTime};

    async fn seeded(names: &[&str]) -> (Arc<MockStore>, FileList) {
        let store = Arc::new(MockStore::default());
        let owner = PrincipalId::from("alice");
        let base = OffsetDateTime::now_utc() - Duration::hours(1);
        for (i, name) in names.iter().enumerate() {
            let record = NewFileRecord::new(*name, 100, "application/pdf", format!("https://cdn.example/{name}"));
            store.insert_raw(&owner, record, Some(base + Duration::minutes(i as i64))).await;
        }
        let session = SessionHandle::signed_in("alice");
        let client = MetadataClient::new(store.clone(), session.into_ref());
        (store, FileList::load(client).await.unwrap())
    }

    #[tokio::test]
    async fn test_load_is_newest_first() {
        let (_store, list) = seeded(&["old.pdf", "new.pdf"]).await;
        let names: Vec<_> = list.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["new.pdf", "old.pdf"]);
        assert_eq!(list.total_size(), 200);
    }

    #[tokio::test]
    async fn test_filter_is_case_insensitive_and_pure() {
        let (_store, list) = seeded(&["Quarterly REPORT.pdf", "invoice.pdf", "report-2.pdf"]).await;
        let hits: Vec<_> = list.filter("report").into_iter().map(|f| f.name.as_str()).collect();
        assert_eq!(hits, ["report-2.pdf", "Quarterly REPORT.pdf"]);
        assert_eq!(list.filter("").len(), 3);
        assert!(list.filter("nothing").is_empty());
        assert_eq!(list.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_clears_selection() {
        let (store, mut list) = seeded(&["a.pdf", "b.pdf"]).await;
        let id = list.files()[0].id.clone();
        assert!(list.select(&id).is_some());

        list.on_delete_requested(&id).await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.get(&id).is_none());
        assert!(list.selected().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_other_keeps_selection() {
        let (_store, mut list) = seeded(&["a.pdf", "b.pdf"]).await;
        let keep = list.files()[0].id.clone();
        let remove = list.files()[1].id.clone();
        list.select(&keep);
        list.on_delete_requested(&remove).await.unwrap();
        assert_eq!(list.selected().map(|f| &f.id), Some(&keep));
    }

    #[tokio::test]
    async fn test_failed_delete_changes_nothing() {
        let (store, mut list) = seeded(&["a.pdf"]).await;
        let id = list.files()[0].id.clone();
        list.select(&id);
        store.set_failing_writes(true);
        assert!(list.on_delete_requested(&id).await.is_err());
        assert_eq!(list.len(), 1);
        assert!(list.selected().is_some());
    }

    #[tokio::test]
    async fn test_upload_complete_prepends() {
        let (_store, mut list) = seeded(&["a.pdf"]).await;
        let record = FileMetadata::from_record(
            FileId::from("new"),
            PrincipalId::from("alice"),
            NewFileRecord::new("b.png", 1, "image/png", "https://cdn.example/b.png"),
            OffsetDateTime::now_utc(),
        );
        list.on_upload_complete(record);
        assert_eq!(list.files()[0].name, "b.png");
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_select_unknown_id() {
        let (_store, mut list) = seeded(&["a.pdf"]).await;
        assert!(list.select(&FileId::from("missing")).is_none());
        assert!(list.selected().is_none());
    }
}
