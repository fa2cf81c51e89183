//! Configuration file handling.
//!
//! The configuration file is stored at `$SPENDWISE_HOME/config.json` and holds the currencies, the
//! remote store and rate service settings, and the sync tunables.

use crate::api::DEFAULT_RATE_API_URL;
use crate::backup::Backup;
use crate::db::Db;
use crate::model::CurrencyCode;
use crate::sync::{EngineSettings, RetryPolicy};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "spendwise";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 10;
const BOOTSTRAP_TIMEOUT_SECS: u64 = 7;
const RATE_TTL_SECS: u64 = 3600;
const MAX_SYNC_ATTEMPTS: u32 = 20;
const MAX_PENDING_AGE_DAYS: u64 = 30;
const BACKUPS: &str = ".backups";
const CONFIG_JSON: &str = "config.json";
const SPENDWISE_SQLITE: &str = "spendwise.sqlite";

/// Settings chosen when the home directory is created. Anything left as `None` takes its default.
#[derive(Debug, Clone, Default)]
pub struct InitSettings {
    pub home_currency: Option<CurrencyCode>,
    pub display_currency: Option<CurrencyCode>,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    pub rate_api_key: Option<String>,
}

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$SPENDWISE_HOME` and from there it loads `$SPENDWISE_HOME/config.json`. It also
/// owns the local database that lives in the same directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory, its subdirectories, an initial `config.json` and an empty
    /// database.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail, or if a database already exists there.
    pub async fn create(dir: impl Into<PathBuf>, settings: InitSettings) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the spendwise home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups_dir = root.join(BACKUPS);
        utils::make_dir(&backups_dir).await?;

        let config_path = root.join(CONFIG_JSON);
        let home_currency = settings.home_currency.unwrap_or_default();
        let config_file = ConfigFile {
            display_currency: settings.display_currency,
            home_currency,
            remote_url: settings.remote_url,
            remote_api_key: settings.remote_api_key,
            rate_api_key: settings.rate_api_key,
            ..ConfigFile::default()
        };
        // The database refuses to overwrite an existing one, so create it before the config file.
        let db_path = root.join(SPENDWISE_SQLITE);
        let db = Db::init(&db_path)
            .await
            .context("Unable to create SQLite DB")?;
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            backups: backups_dir,
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        })
    }

    /// This will
    /// - validate that `spendwise_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups directory exists
    /// - open the database, migrating it if needed
    pub async fn load(spendwise_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = spendwise_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Spendwise home is missing, run 'spendwise init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let backups = root.join(BACKUPS);
        if !backups.is_dir() {
            bail!("The backups directory is missing '{}'", backups.display())
        }

        let db_path = root.join(SPENDWISE_SQLITE);
        let db = Db::load(&db_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            backups,
            config_path,
            config_file,
            db,
            sqlite_path: db_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::from_config(self)
    }

    /// The currency that receipt drafts default to.
    pub fn home_currency(&self) -> &CurrencyCode {
        &self.config_file.home_currency
    }

    /// The currency that totals and reports are shown in, the home currency unless set.
    pub fn display_currency(&self) -> &CurrencyCode {
        self.config_file
            .display_currency
            .as_ref()
            .unwrap_or(&self.config_file.home_currency)
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.config_file.remote_url.as_deref()
    }

    pub fn remote_api_key(&self) -> Option<&str> {
        self.config_file.remote_api_key.as_deref()
    }

    pub fn rate_api_url(&self) -> &str {
        &self.config_file.rate_api_url
    }

    pub fn rate_api_key(&self) -> Option<&str> {
        self.config_file.rate_api_key.as_deref()
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.config_file.request_timeout_secs
    }

    /// How long a fetched exchange rate stays fresh, in millis.
    pub fn rate_ttl_millis(&self) -> i64 {
        i64::try_from(self.config_file.rate_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let f = &self.config_file;
        EngineSettings {
            bootstrap_timeout: Duration::from_secs(f.bootstrap_timeout_secs),
            retry: RetryPolicy {
                max_attempts: f.max_sync_attempts,
                max_age: Duration::from_secs(f.max_pending_age_days * 24 * 60 * 60),
            },
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "spendwise",
///   "config_version": 1,
///   "home_currency": "INR",
///   "display_currency": "USD",
///   "remote_url": "https://abcdefgh.supabase.co",
///   "remote_api_key": "public-anon-key",
///   "rate_api_url": "https://v6.exchangerate-api.com/v6",
///   "rate_api_key": "0123456789abcdef",
///   "backup_copies": 5,
///   "request_timeout_secs": 10,
///   "bootstrap_timeout_secs": 7,
///   "rate_ttl_secs": 3600,
///   "max_sync_attempts": 20,
///   "max_pending_age_days": 30
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "spendwise"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    #[serde(default)]
    home_currency: CurrencyCode,

    /// Follows `home_currency` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_currency: Option<CurrencyCode>,

    /// Base URL of the remote store. Without it, sync is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_api_key: Option<String>,

    #[serde(default = "default_rate_api_url")]
    rate_api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_api_key: Option<String>,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    #[serde(default = "default_bootstrap_timeout_secs")]
    bootstrap_timeout_secs: u64,

    #[serde(default = "default_rate_ttl_secs")]
    rate_ttl_secs: u64,

    /// Failed replays after which a queued change is dropped
    #[serde(default = "default_max_sync_attempts")]
    max_sync_attempts: u32,

    /// Age after which a queued change is dropped
    #[serde(default = "default_max_pending_age_days")]
    max_pending_age_days: u64,
}

fn default_rate_api_url() -> String {
    DEFAULT_RATE_API_URL.to_string()
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_bootstrap_timeout_secs() -> u64 {
    BOOTSTRAP_TIMEOUT_SECS
}

fn default_rate_ttl_secs() -> u64 {
    RATE_TTL_SECS
}

fn default_max_sync_attempts() -> u32 {
    MAX_SYNC_ATTEMPTS
}

fn default_max_pending_age_days() -> u64 {
    MAX_PENDING_AGE_DAYS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            home_currency: CurrencyCode::default(),
            display_currency: None,
            remote_url: None,
            remote_api_key: None,
            rate_api_url: default_rate_api_url(),
            rate_api_key: None,
            backup_copies: BACKUP_COPIES,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            bootstrap_timeout_secs: BOOTSTRAP_TIMEOUT_SECS,
            rate_ttl_secs: RATE_TTL_SECS,
            max_sync_attempts: MAX_SYNC_ATTEMPTS,
            max_pending_age_days: MAX_PENDING_AGE_DAYS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}
