//! Backups of the local expense snapshot, taken before remote data replaces it.

use crate::model::Expense;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Prefix for snapshot backup files.
pub const SNAPSHOT: &str = "snapshot";

const EXTENSION: &str = "json";

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    pub fn new(backups_dir: impl Into<PathBuf>, backup_copies: u32) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            backup_copies,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backups(), config.backup_copies())
    }

    pub fn dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Saves `expenses` as a pretty-printed JSON backup file.
    ///
    /// The filename format is `snapshot.YYYY-MM-DD-NNN.json` where NNN is a sequence number within
    /// the day. Old backups are rotated so that only `backup_copies` files remain.
    ///
    /// Returns the path to the created backup file.
    pub async fn save_snapshot(&self, expenses: &[Expense], today: NaiveDate) -> Result<PathBuf> {
        let date = today.format("%Y-%m-%d").to_string();
        let seq = self.next_sequence_number(SNAPSHOT, &date).await?;
        let path = self
            .backups_dir
            .join(format!("{SNAPSHOT}.{date}-{seq:03}.{EXTENSION}"));

        let json =
            serde_json::to_string_pretty(expenses).context("Failed to serialize the snapshot")?;
        utils::write(&path, json).await?;

        self.rotate(SNAPSHOT).await?;
        Ok(path)
    }

    /// Lists the backup files with `prefix`, oldest first.
    pub async fn list(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_backup_file(&name, prefix) {
                files.push((entry.path(), name));
            }
        }
        // The name sorts by date and then sequence number.
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }

    async fn next_sequence_number(&self, prefix: &str, date: &str) -> Result<u32> {
        let max_seq = self
            .list(prefix)
            .await?
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| parse_sequence_number(&n.to_string_lossy(), prefix, date))
            .max()
            .unwrap_or(0);
        Ok(max_seq + 1)
    }

    async fn rotate(&self, prefix: &str) -> Result<()> {
        let files = self.list(prefix).await?;
        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for path in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }
        Ok(())
    }
}

/// Parses the sequence number from a backup filename of the form `{prefix}.{date}-{NNN}.json`.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str) -> Option<u32> {
    filename
        .strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(&format!(".{EXTENSION}"))?
        .parse()
        .ok()
}

fn is_backup_file(filename: &str, prefix: &str) -> bool {
    filename.starts_with(&format!("{prefix}.")) && filename.ends_with(&format!(".{EXTENSION}"))
}
