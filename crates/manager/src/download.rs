//! Reading stored files back.
//!
//! A download resolves the id through the [`MetadataClient`], so a principal
//! can only ever open its own records, then asks the transport for the bytes
//! behind the record's URL.

use crate::client::MetadataClient;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use filedeck_store::{FileId, FileMetadata};
use filedeck_transport::{BoxAsyncRead, TransportHandle};

#[derive(Clone)]
pub struct Downloader {
    client: MetadataClient,
    transport: TransportHandle,
}

impl Downloader {
    pub fn new(client: MetadataClient, transport: TransportHandle) -> Self {
        Self { client, transport }
    }

    /// Open one of the current principal's files.
    ///
    /// Ids that are unknown, or owned by someone else, are
    /// [`NotFound`](ErrorKind::NotFound). A record whose object is gone
    /// from the transport is a [`Transport`](ErrorKind::Transport) error.
    pub async fn open(&self, id: &FileId) -> Result<(FileMetadata, BoxAsyncRead)> {
        let file = self.client.get(id).await?;
        let reader = self.transport.open(&file.url).await.or_raise(|| ErrorKind::Transport)?;
        tracing::debug!(transport = self.transport.name(), id = %id, url = %file.url, "Opened file");
        Ok((file, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use filedeck_store::{MetadataStore, MockStore, NewFileRecord, PrincipalId};
    use filedeck_transport::SimulatedTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_object_is_a_transport_error() {
        let session = SessionHandle::signed_in("alice");
        let store = Arc::new(MockStore::default());
        let client = MetadataClient::new(store.clone(), session.into_ref());
        let record = NewFileRecord::new("gone.png", 3, "image/png", "https://cdn.example/gone.png");
        let id = store.insert(&PrincipalId::from("alice"), &record).await.unwrap();

        let downloader = Downloader::new(client, Arc::new(SimulatedTransport::default()));
        let Err(err) = downloader.open(&id).await else {
            panic!("opened a file with no stored object");
        };
        assert!(matches!(&*err, ErrorKind::Transport));
    }
}
