//! SQLite metadata store.

use super::FileMetadataStream;
use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::{FileId, FileMetadata, NewFileRecord, PrincipalId};
use crate::row::FileRow;
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use time::OffsetDateTime;
use tracing::instrument;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed metadata store.
///
/// Owner filtering and newest-first ordering run as a single query that walks
/// the `idx_files_owner_pending_first` index in order; nothing is sorted,
/// client-side or in a temporary b-tree. The
/// upload timestamp is a column default, so the database (not the caller)
/// decides when a record was written.
///
/// # Examples
///
/// ```no_run
/// use filedeck_store::{MetadataStore, NewFileRecord, PrincipalId, SqliteStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::connect_in_memory().await.map_err(|e| format!("{e:?}"))?;
/// let owner = PrincipalId::from("user-1");
/// let record = NewFileRecord::new("a.png", 2048, "image/png", "https://cdn.example/a.png");
/// let id = store.insert(&owner, &record).await.map_err(|e| format!("{e:?}"))?;
/// println!("stored as {id}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs must run on EVERY pooled connection, not
            // only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect to the metadata database at the given path.
    ///
    /// Creates the database file (and its parent directory) if it doesn't
    /// exist, then runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io)?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Parallel connections to ":memory:" would each see their own
        // database, so the pool is limited to one.
        Self::new(options, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA cache_size = -4096;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool, waiting for connections to be returned.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, owner: &PrincipalId, record: &NewFileRecord) -> Result<FileId> {
        record.validate()?;
        let id = FileId::generate();
        let row = FileRow::try_from((&id, owner, record))?;
        sqlx::query(include_str!("../../queries/insert_file.sql"))
            .bind(row.id)
            .bind(row.owner)
            .bind(row.name)
            .bind(row.size)
            .bind(row.mime_type)
            .bind(row.url)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(store = self.name(), owner = %owner, id = %id, "Inserted file record");
        Ok(id)
    }

    fn list_stream<'a>(&'a self, owner: &'a PrincipalId) -> FileMetadataStream<'a> {
        Box::pin(stream! {
            // Rows without a server timestamp all resolve to the same instant.
            let now = OffsetDateTime::now_utc();
            let mut rows = sqlx::query_as::<_, FileRow>(include_str!("../../queries/list_files_by_owner.sql"))
                .bind(owner.as_str())
                .fetch(&self.pool);
            while let Some(row) = rows.next().await {
                yield row.or_raise(|| ErrorKind::Database).and_then(|row| row.into_metadata(now));
            }
        })
    }

    async fn get(&self, owner: &PrincipalId, id: &FileId) -> Result<Option<FileMetadata>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../../queries/get_file.sql"))
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|r| r.into_metadata(OffsetDateTime::now_utc())).transpose()
    }

    async fn delete(&self, owner: &PrincipalId, id: &FileId) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_file.sql"))
            .bind(owner.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let removed = result.rows_affected() > 0;
        tracing::debug!(store = self.name(), owner = %owner, id = %id, removed, "Deleted file record");
        Ok(removed)
    }
}
