//! The SQLite-backed `LocalStore`.

mod migrations;

use crate::model::{Expense, PendingOperation};
use crate::store::{decode, encode, LocalStore, EXPENSES, PENDING_OPS};
use crate::Result;
use anyhow::{bail, Context};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the schema
    pub async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at {}", path.display());
        }
        Self::open(path, true).await
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Migrates the schema if it is out-of-date
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        Self::open(path, false).await
    }

    async fn open(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(create);

        // Every write replaces a whole collection, one connection serializes them.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;

        migrations::upgrade(&pool).await?;
        debug!("Opened local database {}", path.display());
        Ok(Self { pool })
    }

    async fn read_collection(&self, name: &str) -> Option<String> {
        let result: std::result::Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT data FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await;
        match result {
            Ok(row) => row.map(|(data,)| data),
            Err(e) => {
                warn!("Unable to read the local collection '{name}': {e}");
                None
            }
        }
    }

    async fn write_collection(&self, name: &str, data: String) -> Result<()> {
        sqlx::query(
            "INSERT INTO collections (name, data, updated_at) VALUES (?, ?, ?) \
            ON CONFLICT(name) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(data)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write the local collection '{name}'"))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn write_raw(&self, name: &str, data: &str) -> Result<()> {
        self.write_collection(name, data.to_string()).await
    }
}

#[async_trait::async_trait]
impl LocalStore for Db {
    async fn load(&self) -> Vec<Expense> {
        decode(EXPENSES, self.read_collection(EXPENSES).await)
    }

    async fn save(&self, expenses: &[Expense]) -> Result<()> {
        self.write_collection(EXPENSES, encode(expenses)?).await
    }

    async fn load_queue(&self) -> Vec<PendingOperation> {
        decode(PENDING_OPS, self.read_collection(PENDING_OPS).await)
    }

    async fn save_queue(&self, ops: &[PendingOperation]) -> Result<()> {
        self.write_collection(PENDING_OPS, encode(ops)?).await
    }
}
