//! Brings the local database schema up to the version this build expects.
//!
//! `SCHEMA[n]` upgrades a database at version `n` to version `n + 1`. The schema only ever moves
//! forward: a database written by a newer build is refused instead of downgraded.

use crate::Result;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[include_str!("01_collections.sql")];

/// The schema version this build of the program expects.
pub(crate) const CURRENT_VERSION: i64 = SCHEMA.len() as i64;

/// Reads the stored schema version, creating the bookkeeping table on a new database, and applies
/// every step past it. Returns the version the database is at afterwards.
pub(crate) async fn upgrade(pool: &SqlitePool) -> Result<i64> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;
    let (stored,): (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;
    let version = stored.unwrap_or(0);
    if version > CURRENT_VERSION {
        bail!(
            "The database schema version {version} is newer than this program supports \
            ({CURRENT_VERSION}). Is a newer version of spendwise available?"
        );
    }
    if version == CURRENT_VERSION {
        debug!("Local schema already at version {version}");
        return Ok(version);
    }

    for (step, sql) in SCHEMA.iter().enumerate().skip(version as usize) {
        let next = step as i64 + 1;
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin schema upgrade")?;
        tx.execute(*sql)
            .await
            .with_context(|| format!("Failed to upgrade the schema to version {next}"))?;
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut *tx)
            .await
            .context("Failed to clear schema_version")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(next)
            .execute(&mut *tx)
            .await
            .context("Failed to record schema_version")?;
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit schema version {next}"))?;
    }
    info!("Upgraded the local schema from version {version} to {CURRENT_VERSION}");
    Ok(CURRENT_VERSION)
}
