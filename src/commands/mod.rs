//! Command handlers for the spendwise CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod add;
mod delete;
mod init;
mod query;
mod sync;
mod update;

use crate::api::{self, Mode, Session};
use crate::currency::{CurrencyNormalizer, RateCache};
use crate::store::LocalStore;
use crate::sync::{Connectivity, MutationOutcome, SyncEngine};
use crate::utils::SystemClock;
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use add::{add, scan};
pub use delete::delete;
pub use init::init;
pub use query::{convert, export, list, summary};
pub use sync::{status, sync};
pub use update::update;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// How the commands that touch expenses reach the remote store.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Treat the network as unavailable.
    pub offline: bool,
    /// The signed-in user, `None` for local-only use.
    pub session: Option<Session>,
}

/// An expense after a mutation, and what happened on the remote side.
#[derive(Debug, Clone, Serialize)]
pub struct Recorded<T>
where
    T: Serialize + Clone + Debug,
{
    pub record: T,
    pub outcome: MutationOutcome,
}

/// Opens the sync engine over the local database and starts it, which replays queued changes
/// when there is a signed-in user and a connection.
pub(crate) async fn open_engine(
    config: &Config,
    mode: Mode,
    options: &SyncOptions,
) -> Result<SyncEngine> {
    let store: Arc<dyn LocalStore> = Arc::new(config.db().clone());
    let connectivity = Arc::new(Connectivity::new(!options.offline));
    let mut builder = SyncEngine::builder(store, connectivity)
        .settings(config.engine_settings())
        .backup(config.backup());
    if let Some(session) = &options.session {
        match api::remote(config, session, mode)? {
            Some(remote) => builder = builder.remote(remote, session.clone()),
            None => warn!(
                "Signed in as '{}' but no remote_url is configured, working locally",
                session.user_id
            ),
        }
    }
    let engine = builder.build().await;
    if let Some(report) = engine.start().await {
        debug!("Startup drain: {report:?}");
    }
    Ok(engine)
}

pub(crate) fn normalizer(config: &Config, mode: Mode) -> Result<CurrencyNormalizer> {
    Ok(CurrencyNormalizer::new(
        Arc::new(RateCache::new(config.rate_ttl_millis())),
        api::rate_source(config, mode)?,
        Arc::new(SystemClock),
    ))
}

/// A one-line account of a mutation for the user.
pub(crate) fn describe(verb: &str, id: &str, outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Synced => format!("{verb} expense {id} and synced it"),
        MutationOutcome::Queued { reason } => {
            format!("{verb} expense {id}, it will sync later ({reason})")
        }
        MutationOutcome::LocalOnly => format!("{verb} expense {id} locally"),
    }
}
