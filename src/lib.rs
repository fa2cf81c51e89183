pub mod analytics;
pub mod api;
pub mod args;
pub mod backup;
pub mod commands;
mod config;
pub mod currency;
mod db;
mod error;
pub mod export;
pub mod model;
pub mod store;
pub mod sync;
#[cfg(test)]
mod test;
mod utils;

pub use api::Mode;
pub use config::{Config, InitSettings};
pub use db::Db;
pub use error::Error;
pub use error::Result;
pub use utils::{Clock, ManualClock, SystemClock};
