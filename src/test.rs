//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::Session;
use crate::commands::SyncOptions;
use crate::config::InitSettings;
use crate::model::CurrencyCode;
use crate::Config;
use std::path::Path;
use std::str::FromStr;
use tempfile::TempDir;

/// Test environment that sets up a spendwise home directory with Config and database.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with INR as the home and display currency.
    pub async fn new() -> Self {
        Self::with_currency("INR").await
    }

    pub async fn with_currency(home_currency: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("spendwise");
        let settings = InitSettings {
            home_currency: Some(CurrencyCode::from_str(home_currency).unwrap()),
            ..InitSettings::default()
        };
        let config = Config::create(&root, settings).await.unwrap();
        Self { temp_dir, config }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// A scratch directory next to the spendwise home.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// No user, so nothing is sent or queued.
    pub fn local() -> SyncOptions {
        SyncOptions::default()
    }

    /// A signed-in user with the given connectivity.
    pub fn signed_in(online: bool) -> SyncOptions {
        SyncOptions {
            offline: !online,
            session: Some(Session::new("test-user", Some("test-token".to_string()))),
        }
    }
}
