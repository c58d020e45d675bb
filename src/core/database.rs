use crate::core::pose_store::{KeyValueStore, StoreResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

/// SQLite-backed key-value store
#[derive(Debug, Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at the default location
    pub async fn init() -> StoreResult<Self> {
        let db_path = Self::get_db_path()?;
        Self::open(&db_path).await
    }

    /// Open (or create) the database at `db_path`
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        // Create database directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;

        tracing::info!(path = %db_path.display(), "Opened key-value store");
        Ok(db)
    }

    /// Private in-memory database, mainly for tests and ephemeral hosts
    pub async fn in_memory() -> StoreResult<Self> {
        // One connection: every pooled connection to `sqlite::memory:` would
        // otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    /// Get the pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_schema(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the database file path
    fn get_db_path() -> StoreResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "Could not determine home directory")
            })?;

        let mut path = PathBuf::from(home);
        path.push(".poise_data");
        path.push("store");
        path.push("poise.db");

        Ok(path)
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let updated_at = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
