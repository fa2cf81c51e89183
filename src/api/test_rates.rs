//! Implements `RateSource` with a fixed table of rates.

use crate::api::RateSource;
use crate::model::CurrencyCode;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Seed rates into INR.
const INR_RATES: &[(&str, f64)] = &[
    ("USD", 84.0),
    ("EUR", 88.0),
    ("JPY", 0.55),
    ("GBP", 105.0),
    ("AUD", 54.0),
    ("CAD", 61.0),
];

type Pair = (String, String);

/// An in-memory rate source that counts how often it is asked.
#[derive(Debug)]
pub struct TestRates {
    rates: Mutex<HashMap<Pair, f64>>,
    failing: Mutex<HashSet<Pair>>,
    calls: AtomicUsize,
}

impl TestRates {
    /// A rate source that knows no rates at all.
    pub fn empty() -> Self {
        Self {
            rates: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_rate(&self, from: &str, to: &str, rate: f64) {
        if let Ok(mut rates) = self.rates.lock() {
            rates.insert((from.to_string(), to.to_string()), rate);
        }
    }

    /// Makes lookups of `from`->`to` fail.
    pub fn fail_pair(&self, from: &str, to: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert((from.to_string(), to.to_string()));
        }
    }

    /// The number of lookups made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for TestRates {
    /// Loads the seed rates into INR.
    fn default() -> Self {
        let rates = Self::empty();
        for (from, rate) in INR_RATES {
            rates.set_rate(from, "INR", *rate);
        }
        rates
    }
}

#[async_trait::async_trait]
impl RateSource for TestRates {
    async fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pair = (from.to_string(), to.to_string());
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&pair))
            .unwrap_or(false);
        if failing {
            bail!("The test rate source failed for {from}->{to}");
        }
        self.rates
            .lock()
            .ok()
            .and_then(|r| r.get(&pair).copied())
            .with_context(|| format!("No test rate for {from}->{to}"))
    }
}
