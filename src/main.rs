use clap::Parser;
use spendwise::args::{Args, Command};
use spendwise::commands::{self, SyncOptions};
use spendwise::{Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().spendwise_home().path();

    // With SPENDWISE_IN_TEST_MODE set, the remote store and the rate service are in-memory.
    let mode = Mode::from_env();
    let options = SyncOptions {
        offline: args.common().offline(),
        session: args.common().session(),
    };

    let _: () = match args.command().clone() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),
        Command::Add(add_args) => commands::add(Config::load(home).await?, mode, &options, add_args)
            .await?
            .print(),
        Command::Update(update_args) => {
            commands::update(Config::load(home).await?, mode, &options, update_args)
                .await?
                .print()
        }
        Command::Delete(delete_args) => {
            commands::delete(Config::load(home).await?, mode, &options, delete_args)
                .await?
                .print()
        }
        Command::List(list_args) => {
            commands::list(Config::load(home).await?, mode, &options, list_args)
                .await?
                .print()
        }
        Command::Scan(scan_args) => {
            commands::scan(Config::load(home).await?, mode, &options, scan_args)
                .await?
                .print()
        }
        Command::Sync => commands::sync(Config::load(home).await?, mode, &options)
            .await?
            .print(),
        Command::Status => commands::status(Config::load(home).await?, mode, &options)
            .await?
            .print(),
        Command::Convert(convert_args) => {
            commands::convert(Config::load(home).await?, mode, convert_args)
                .await?
                .print()
        }
        Command::Summary(summary_args) => {
            commands::summary(Config::load(home).await?, mode, &options, summary_args)
                .await?
                .print()
        }
        Command::Export(export_args) => {
            commands::export(Config::load(home).await?, mode, &options, export_args)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        // Without RUST_LOG, only this crate logs, at the requested level.
        None => EnvFilter::new(format!(
            "{}={},{}={}",
            env!("CARGO_CRATE_NAME"),
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
