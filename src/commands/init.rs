use crate::args::InitArgs;
use crate::commands::Out;
use crate::config::InitSettings;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories, the initial `config.json` and the database.
///
/// # Errors
/// - Returns an error if any file operations fail, or if the directory was already initialized.
pub async fn init(spendwise_home: &Path, args: InitArgs) -> Result<Out<()>> {
    let settings = InitSettings {
        home_currency: args.home_currency,
        display_currency: args.display_currency,
        remote_url: args.remote_url,
        remote_api_key: args.remote_api_key,
        rate_api_key: args.rate_api_key,
    };
    let config = Config::create(spendwise_home, settings)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Created the spendwise directory at {} with home currency {}",
        config.root().display(),
        config.home_currency()
    )
    .into())
}
