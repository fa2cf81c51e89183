//! Multi-currency normalization: a TTL cache of exchange rates and the normalizer that uses it.

mod cache;
mod normalizer;

pub use cache::{ExchangeRateEntry, RateCache, DEFAULT_TTL_MILLIS};
pub use normalizer::{CurrencyNormalizer, FALLBACK_RATE};
