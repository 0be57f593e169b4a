//! SQLite pool for the mirror and the outbound queue
//!
//! Both tables live in one database file so a mirror write and its enqueue
//! can share a transaction. The schema is applied on every open; every
//! statement in it is `IF NOT EXISTS`.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20261016_initial.sql");

/// Connections for a file database (one writer at a time, many readers)
const FILE_CONNECTIONS: u32 = 4;

/// How long a writer waits for the lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the local database
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database at `db_path`, creating the file and its parent
    /// directory on first use
    ///
    /// The database runs in WAL mode with `synchronous = NORMAL`: a
    /// committed mutation survives a process crash.
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or file cannot be
    /// opened, `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot open {}: {e}", db_path.display()))
            })?;

        apply_schema(&pool).await?;
        info!(path = %db_path.display(), "Local database ready");
        Ok(Self { pool })
    }

    /// Opens a private in-memory database (tests)
    ///
    /// An in-memory SQLite database belongs to a single connection, so the
    /// pool is limited to one.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        apply_schema(&pool).await?;
        debug!("In-memory database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection and checkpoints the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
    debug!("Schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = DatabasePool::in_memory().await.unwrap();
        apply_schema(db.pool()).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(names, ["mirror_entries", "outbound_queue"]);
    }

    #[tokio::test]
    async fn test_file_database_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("healthbuddy.db");

        let db = DatabasePool::new(&path).await.unwrap();
        assert!(path.exists());
        db.close().await;
    }
}
