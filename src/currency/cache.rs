use crate::model::CurrencyCode;
use std::collections::HashMap;
use std::sync::RwLock;

/// How long a fetched rate stays fresh by default: one hour.
pub const DEFAULT_TTL_MILLIS: i64 = 3600 * 1000;

/// A cached rate and when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRateEntry {
    pub rate: f64,
    /// Epoch millis.
    pub fetched_at: i64,
}

/// Process-lifetime exchange rates keyed by `(from, to)`. An entry is served while
/// `now - fetched_at < ttl`; a stale entry is replaced wholesale by the next `put`.
#[derive(Debug)]
pub struct RateCache {
    ttl_millis: i64,
    entries: RwLock<HashMap<(CurrencyCode, CurrencyCode), ExchangeRateEntry>>,
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MILLIS)
    }
}

impl RateCache {
    pub fn new(ttl_millis: i64) -> Self {
        Self {
            ttl_millis,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl_millis(&self) -> i64 {
        self.ttl_millis
    }

    /// Returns the cached rate for the pair if it is still fresh at `now`.
    pub fn get(&self, from: &CurrencyCode, to: &CurrencyCode, now: i64) -> Option<f64> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(&(from.clone(), to.clone()))?;
        if now - entry.fetched_at < self.ttl_millis {
            Some(entry.rate)
        } else {
            None
        }
    }

    pub fn put(&self, from: &CurrencyCode, to: &CurrencyCode, rate: f64, now: i64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                (from.clone(), to.clone()),
                ExchangeRateEntry {
                    rate,
                    fetched_at: now,
                },
            );
        }
    }

    /// The raw entry for the pair, fresh or not.
    pub fn entry(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<ExchangeRateEntry> {
        self.entries
            .read()
            .ok()?
            .get(&(from.clone(), to.clone()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::from_str(s).unwrap()
    }

    #[test]
    fn test_fresh_until_ttl() {
        let cache = RateCache::new(1000);
        cache.put(&code("USD"), &code("INR"), 83.0, 10_000);
        assert_eq!(cache.get(&code("USD"), &code("INR"), 10_000), Some(83.0));
        assert_eq!(cache.get(&code("USD"), &code("INR"), 10_999), Some(83.0));
        assert_eq!(cache.get(&code("USD"), &code("INR"), 11_000), None);
    }

    #[test]
    fn test_pairs_are_directional() {
        let cache = RateCache::default();
        cache.put(&code("USD"), &code("INR"), 83.0, 0);
        assert_eq!(cache.get(&code("INR"), &code("USD"), 0), None);
    }

    #[test]
    fn test_stale_entry_is_overwritten() {
        let cache = RateCache::new(1000);
        cache.put(&code("EUR"), &code("INR"), 88.0, 0);
        cache.put(&code("EUR"), &code("INR"), 90.0, 5000);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.entry(&code("EUR"), &code("INR")),
            Some(ExchangeRateEntry {
                rate: 90.0,
                fetched_at: 5000
            })
        );
    }
}
