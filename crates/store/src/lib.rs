//! Owner-scoped file metadata store.
//!
//! Every uploaded file is described by one [`FileMetadata`] record: what the
//! file is called, how large it is, where the transport put it, and who owns
//! it. The store is the only place such records live; it never sees file
//! bytes.
//!
//! # Architecture
//! - **[`MetadataStore`]**: the trait that both adapters implement. Reads and
//!   deletes always take an owner; there is no unscoped query.
//! - **[`SqliteStore`]**: the production adapter (SQLite via `sqlx`), with
//!   embedded migrations and SQL kept under `queries/`.
//! - **`MockStore`**: an in-memory adapter behind the `mock` feature, for
//!   other crates' tests.

pub mod error;
mod models;
mod row;
pub mod store;

pub use crate::models::{FileId, FileMetadata, NewFileRecord, PrincipalId};
#[cfg(feature = "mock")]
pub use crate::store::MockStore;
pub use crate::store::{MetadataStore, SqliteStore};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn MetadataStore + Send + Sync>;
