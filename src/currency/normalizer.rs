use crate::api::RateSource;
use crate::currency::RateCache;
use crate::model::{CurrencyCode, Expense};
use crate::utils::Clock;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// The rate used whenever a real one cannot be obtained.
pub const FALLBACK_RATE: f64 = 1.0;

/// Converts amounts between currencies using cached rates.
///
/// Conversion never fails. When the rate source errors, or returns a rate that is not a positive
/// finite number, the conversion falls back to 1:1 so that a dashboard can always render. No
/// rounding happens here; that is left to whatever displays the result.
#[derive(Clone)]
pub struct CurrencyNormalizer {
    cache: Arc<RateCache>,
    source: Arc<dyn RateSource>,
    clock: Arc<dyn Clock>,
}

impl CurrencyNormalizer {
    pub fn new(cache: Arc<RateCache>, source: Arc<dyn RateSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            source,
            clock,
        }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// The rate from `from` into `to`. Identical currencies are exactly 1 without touching the
    /// cache or the rate source.
    pub async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> f64 {
        if from == to {
            return 1.0;
        }
        let now = self.clock.now_millis();
        if let Some(rate) = self.cache.get(from, to, now) {
            debug!("Using cached rate {from}->{to} = {rate}");
            return rate;
        }
        match self.source.fetch_rate(from, to).await {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                debug!("Fetched rate {from}->{to} = {rate}");
                self.cache.put(from, to, rate, now);
                rate
            }
            Ok(rate) => {
                warn!("Ignoring unusable rate {rate} for {from}->{to}, converting 1:1");
                FALLBACK_RATE
            }
            Err(e) => {
                warn!("Unable to get the {from}->{to} rate, converting 1:1: {e:#}");
                FALLBACK_RATE
            }
        }
    }

    /// Converts `amount` from `from` into `to`.
    pub async fn convert(&self, amount: f64, from: &CurrencyCode, to: &CurrencyCode) -> f64 {
        if from == to {
            return amount;
        }
        amount * self.rate(from, to).await
    }

    /// Returns a copy of `expenses` with every amount expressed in `target`.
    ///
    /// Each distinct source currency is resolved once, and the lookups run concurrently. The
    /// returned expenses keep their order and every field other than `amount` and `currency`.
    pub async fn convert_collection(
        &self,
        expenses: &[Expense],
        target: &CurrencyCode,
    ) -> Vec<Expense> {
        let sources: BTreeSet<&CurrencyCode> = expenses
            .iter()
            .map(|e| &e.currency)
            .filter(|c| *c != target)
            .collect();
        let lookups = sources.into_iter().map(|from| async move {
            let rate = self.rate(from, target).await;
            (from.clone(), rate)
        });
        let rates: HashMap<CurrencyCode, f64> = join_all(lookups).await.into_iter().collect();

        expenses
            .iter()
            .map(|e| {
                let mut converted = e.clone();
                if let Some(rate) = rates.get(&e.currency) {
                    converted.amount = e.amount * rate;
                    converted.currency = target.clone();
                }
                converted
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestRates;
    use crate::model::expense::expense;
    use crate::utils::ManualClock;
    use std::str::FromStr;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::from_str(s).unwrap()
    }

    struct Fixture {
        rates: Arc<TestRates>,
        clock: Arc<ManualClock>,
        normalizer: CurrencyNormalizer,
    }

    fn fixture() -> Fixture {
        let rates = Arc::new(TestRates::empty());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let normalizer =
            CurrencyNormalizer::new(Arc::new(RateCache::default()), rates.clone(), clock.clone());
        Fixture {
            rates,
            clock,
            normalizer,
        }
    }

    #[tokio::test]
    async fn test_identity_makes_no_call_and_no_entry() {
        let f = fixture();
        for amount in [0.0, 0.01, 459.75, 1e12] {
            let out = f.normalizer.convert(amount, &code("INR"), &code("INR")).await;
            assert_eq!(out, amount);
        }
        assert_eq!(f.rates.calls(), 0);
        assert!(f.normalizer.cache().is_empty());
    }

    #[tokio::test]
    async fn test_usd_to_inr() {
        let f = fixture();
        f.rates.set_rate("USD", "INR", 83.0);
        let out = f.normalizer.convert(12.50, &code("USD"), &code("INR")).await;
        assert_eq!(out, 1037.50);
    }

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let f = fixture();
        f.rates.set_rate("USD", "INR", 83.0);
        f.normalizer.convert(10.0, &code("USD"), &code("INR")).await;
        f.clock.advance(59 * 60 * 1000);
        let out = f.normalizer.convert(10.0, &code("USD"), &code("INR")).await;
        assert_eq!(out, 830.0);
        assert_eq!(f.rates.calls(), 1);
    }

    #[tokio::test]
    async fn test_refetched_after_ttl() {
        let f = fixture();
        f.rates.set_rate("USD", "INR", 83.0);
        f.normalizer.convert(10.0, &code("USD"), &code("INR")).await;
        f.clock.advance(3600 * 1000);
        f.rates.set_rate("USD", "INR", 84.0);
        let out = f.normalizer.convert(10.0, &code("USD"), &code("INR")).await;
        assert_eq!(out, 840.0);
        assert_eq!(f.rates.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_identity() {
        let f = fixture();
        f.rates.set_rate("EUR", "INR", 88.0);
        f.rates.fail_pair("EUR", "INR");
        let out = f.normalizer.convert(100.0, &code("EUR"), &code("INR")).await;
        assert_eq!(out, 100.0);
        // A failure is not cached, the next call asks again.
        assert!(f.normalizer.cache().is_empty());
        f.normalizer.convert(100.0, &code("EUR"), &code("INR")).await;
        assert_eq!(f.rates.calls(), 2);
    }

    #[tokio::test]
    async fn test_unusable_rate_falls_back_to_identity() {
        let f = fixture();
        f.rates.set_rate("JPY", "INR", 0.0);
        let out = f.normalizer.convert(3500.0, &code("JPY"), &code("INR")).await;
        assert_eq!(out, 3500.0);
        assert!(f.normalizer.cache().is_empty());
    }

    #[tokio::test]
    async fn test_convert_collection() {
        let f = fixture();
        f.rates.set_rate("USD", "INR", 84.0);
        f.rates.set_rate("EUR", "INR", 88.0);
        let source = vec![
            expense("a", 459.75, "INR"),
            expense("b", 12.50, "USD"),
            expense("c", 28.99, "EUR"),
            expense("d", 15.99, "USD"),
        ];
        let before = source.clone();

        let out = f
            .normalizer
            .convert_collection(&source, &code("INR"))
            .await;

        assert_eq!(source, before);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], source[0]);
        assert_eq!(out[1].amount, 12.50 * 84.0);
        assert_eq!(out[2].amount, 28.99 * 88.0);
        assert_eq!(out[3].amount, 15.99 * 84.0);
        assert!(out.iter().all(|e| e.currency == code("INR")));
        assert_eq!(out[1].merchant, source[1].merchant);
        // One lookup per distinct currency.
        assert_eq!(f.rates.calls(), 2);
    }

    #[tokio::test]
    async fn test_convert_collection_partial_failure() {
        let f = fixture();
        f.rates.set_rate("USD", "INR", 84.0);
        f.rates.fail_pair("GBP", "INR");
        let source = vec![expense("a", 10.0, "USD"), expense("b", 5.75, "GBP")];
        let out = f
            .normalizer
            .convert_collection(&source, &code("INR"))
            .await;
        assert_eq!(out[0].amount, 840.0);
        assert_eq!(out[1].amount, 5.75);
    }
}
