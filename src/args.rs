//! These structs provide the CLI interface for the spendwise CLI.

use crate::api::Session;
use crate::model::{CurrencyCode, ExpenseFilter};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// spendwise: an offline-first expense tracker.
///
/// Expenses are recorded locally first and synced to a remote store when you are signed in and
/// online. Changes made while offline are queued and replayed, in order, the next time the
/// program runs with a connection. Amounts in different currencies are converted with cached
/// exchange rates for totals and reports.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file and database.
    ///
    /// This is the first command you should run. To sync with a remote store, pass its URL as
    /// --remote-url and then provide --user-id (and usually --access-token) on later commands.
    Init(InitArgs),
    /// Record a new expense.
    Add(AddArgs),
    /// Change fields of an existing expense.
    Update(UpdateArgs),
    /// Delete an expense.
    Delete(DeleteArgs),
    /// List expenses, newest first.
    List(ListArgs),
    /// Record an expense from a receipt-analysis JSON file.
    Scan(ScanArgs),
    /// Load the remote expenses and replay queued changes.
    Sync,
    /// Show the changes that are waiting to be synced.
    Status,
    /// Convert an amount between currencies.
    Convert(ConvertArgs),
    /// Show totals, category breakdown and budget usage for a month.
    Summary(SummaryArgs),
    /// Write expenses as CSV.
    Export(ExportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where spendwise data and configuration is held. Defaults to ~/spendwise
    #[arg(long, env = "SPENDWISE_HOME", default_value_t = default_spendwise_home())]
    spendwise_home: DisplayPath,

    /// Work as if there were no network connection. Changes are queued for a later sync.
    #[arg(long)]
    offline: bool,

    /// The signed-in user. Without it the program works locally and queues nothing.
    #[arg(long, env = "SPENDWISE_USER_ID")]
    user_id: Option<String>,

    /// The access token of the signed-in user, sent to the remote store.
    #[arg(long, env = "SPENDWISE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

impl Common {
    pub fn new(log_level: LevelFilter, spendwise_home: PathBuf) -> Self {
        Self {
            log_level,
            spendwise_home: spendwise_home.into(),
            offline: false,
            user_id: None,
            access_token: None,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn spendwise_home(&self) -> &DisplayPath {
        &self.spendwise_home
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    /// The session built from `--user-id` and `--access-token`, if a user id was given.
    pub fn session(&self) -> Option<Session> {
        self.user_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| Session::new(id.trim(), self.access_token.clone()))
    }
}

/// (Not shown): Args for the `spendwise init` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct InitArgs {
    /// Your home currency. Receipt drafts without a currency use it. Defaults to INR.
    #[arg(long)]
    pub home_currency: Option<CurrencyCode>,

    /// The currency totals and reports are shown in. Defaults to the home currency.
    #[arg(long)]
    pub display_currency: Option<CurrencyCode>,

    /// The base URL of the remote store, e.g. https://abcdefgh.supabase.co
    #[arg(long)]
    pub remote_url: Option<String>,

    /// The public API key of the remote store.
    #[arg(long)]
    pub remote_api_key: Option<String>,

    /// The exchangerate-api.com key used for currency conversion.
    #[arg(long)]
    pub rate_api_key: Option<String>,
}

/// (Not shown): Args for the `spendwise add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount spent, a positive number.
    #[arg(long)]
    pub amount: f64,

    /// Where the money was spent.
    #[arg(long)]
    pub merchant: String,

    /// The currency of the amount. Defaults to the home currency.
    #[arg(long)]
    pub currency: Option<CurrencyCode>,

    /// The category id, e.g. food, transport, housing. Defaults to "other".
    #[arg(long)]
    pub category: Option<String>,

    /// The date of the expense as YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub receipt_url: Option<String>,
}

/// (Not shown): Args for the `spendwise update` command. Only the given fields change.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The id of the expense to change.
    pub id: String,

    #[arg(long)]
    pub amount: Option<f64>,

    #[arg(long)]
    pub merchant: Option<String>,

    #[arg(long)]
    pub currency: Option<CurrencyCode>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// An empty value clears the description.
    #[arg(long)]
    pub description: Option<String>,

    /// An empty value clears the receipt link.
    #[arg(long)]
    pub receipt_url: Option<String>,
}

impl UpdateArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount: None,
            merchant: None,
            currency: None,
            category: None,
            date: None,
            description: None,
            receipt_url: None,
        }
    }
}

/// (Not shown): Args for the `spendwise delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The id of the expense to delete.
    pub id: String,
}

/// (Not shown): Args for the `spendwise list` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct ListArgs {
    /// Only expenses on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Only expenses on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only these category ids. May be repeated.
    #[arg(long = "category")]
    pub categories: Vec<String>,

    #[arg(long)]
    pub min_amount: Option<f64>,

    #[arg(long)]
    pub max_amount: Option<f64>,

    /// Case-insensitive text to look for in the merchant, description or category.
    #[arg(long, default_value = "")]
    pub search: String,

    /// Show the amounts converted into this currency.
    #[arg(long)]
    pub currency: Option<CurrencyCode>,
}

impl ListArgs {
    pub fn filter(&self) -> ExpenseFilter {
        ExpenseFilter {
            start_date: self.from,
            end_date: self.to,
            category_ids: self.categories.clone(),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            search: self.search.clone(),
        }
    }
}

/// (Not shown): Args for the `spendwise scan` command.
#[derive(Debug, Parser, Clone)]
pub struct ScanArgs {
    /// A JSON file with any of merchant, amount, date, categoryId and currency.
    #[arg(long)]
    pub file: PathBuf,
}

/// (Not shown): Args for the `spendwise convert` command.
#[derive(Debug, Parser, Clone)]
pub struct ConvertArgs {
    pub amount: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

/// (Not shown): Args for the `spendwise summary` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct SummaryArgs {
    /// The month as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    pub month: Option<String>,

    /// The currency to report in. Defaults to the display currency.
    #[arg(long)]
    pub currency: Option<CurrencyCode>,
}

/// (Not shown): Args for the `spendwise export` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct ExportArgs {
    /// Where to write the CSV. Defaults to stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

fn default_spendwise_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("spendwise"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --spendwise-home or SPENDWISE_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("spendwise")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
