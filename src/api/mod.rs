//! Interfaces to the services this program talks to: the remote expense store and the exchange
//! rate source. Each has a networked implementation and an in-memory implementation; `Mode`
//! decides which one the program uses.

mod exchange_rate;
mod supabase;
mod test_rates;
mod test_remote;

pub use exchange_rate::{ExchangeRateApi, DEFAULT_RATE_API_URL};
pub use supabase::SupabaseRemote;
pub use test_rates::TestRates;
pub use test_remote::{RemoteCall, TestRemote};

use crate::model::{CurrencyCode, Expense};
use crate::{Config, Result};
use std::sync::Arc;
use std::time::Duration;

/// The environment variable that, when set and non-empty, switches the program to `Mode::Test`.
pub const TEST_MODE_ENV: &str = "SPENDWISE_IN_TEST_MODE";

/// Networked persistence for expenses, keyed by expense id. A call either fully succeeds or fails
/// with an error; there is no partial success.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Writes a new expense owned by `owner_id`. Replaying a create for a record that already
    /// exists overwrites it.
    async fn create(&self, expense: &Expense, owner_id: &str) -> Result<()>;

    /// Overwrites an existing expense. Updating an id that does not exist is not an error.
    async fn update(&self, expense: &Expense, owner_id: &str) -> Result<()>;

    /// Removes an expense. Deleting an id that does not exist is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetches every expense owned by `owner_id`.
    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Expense>>;
}

/// A source of exchange rates. Any failure, including a well-formed response that reports an
/// error, is returned as `Err`.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    /// Returns how many units of `to` one unit of `from` buys.
    async fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64>;
}

/// The identity of a signed-in user. Without one the program runs in local-only mode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
        }
    }
}

/// Whether the program talks to real services or to in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Live,
    Test,
}

impl Mode {
    /// Returns `Mode::Test` when `SPENDWISE_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// Builds the remote store for `mode`. Returns `None` in live mode when no remote URL has been
/// configured.
pub(crate) fn remote(
    config: &Config,
    session: &Session,
    mode: Mode,
) -> Result<Option<Arc<dyn RemoteStore>>> {
    match mode {
        Mode::Test => Ok(Some(Arc::new(TestRemote::default()))),
        Mode::Live => {
            let Some(url) = config.remote_url() else {
                return Ok(None);
            };
            let remote = SupabaseRemote::new(
                url,
                config.remote_api_key().unwrap_or_default(),
                session.access_token.clone(),
                Duration::from_secs(config.request_timeout_secs()),
            )?;
            Ok(Some(Arc::new(remote)))
        }
    }
}

/// Builds the rate source for `mode`.
pub(crate) fn rate_source(config: &Config, mode: Mode) -> Result<Arc<dyn RateSource>> {
    match mode {
        Mode::Test => Ok(Arc::new(TestRates::default())),
        Mode::Live => Ok(Arc::new(ExchangeRateApi::new(
            config.rate_api_url(),
            config.rate_api_key().unwrap_or_default(),
            Duration::from_secs(config.request_timeout_secs()),
        )?)),
    }
}
