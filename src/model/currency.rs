//! Currency codes and money formatting.
//!
//! `CurrencyCode` is a validated ISO 4217 style code. `Money` pairs an amount with its currency
//! for display; it is a presentation type and never feeds back into arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currencies the app knows display symbols for, as `(code, symbol, label)`.
pub const CURRENCIES: &[(&str, &str, &str)] = &[
    ("INR", "₹", "Indian Rupee"),
    ("USD", "$", "US Dollar"),
    ("EUR", "€", "Euro"),
    ("GBP", "£", "British Pound"),
    ("JPY", "¥", "Japanese Yen"),
    ("CAD", "C$", "Canadian Dollar"),
    ("AUD", "A$", "Australian Dollar"),
];

/// The currency assumed when none has been configured.
pub const DEFAULT_CURRENCY: &str = "INR";

/// A three letter currency code such as `USD`. Parsing trims whitespace and uppercases, so
/// `" usd"` and `"USD"` are the same code.
///
/// ```
/// # use spendwise::model::CurrencyCode;
/// # use std::str::FromStr;
/// let code = CurrencyCode::from_str("usd").unwrap();
/// assert_eq!(code.as_str(), "USD");
/// assert!(CurrencyCode::from_str("dollars").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The display symbol, or `None` for codes outside of `CURRENCIES`.
    pub fn symbol(&self) -> Option<&'static str> {
        CURRENCIES
            .iter()
            .find(|(code, _, _)| *code == self.0)
            .map(|(_, symbol, _)| *symbol)
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self(DEFAULT_CURRENCY.to_string())
    }
}

/// Returned when a string is not a three letter currency code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyCodeError(String);

impl Display for CurrencyCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not a currency code, expected three letters such as USD",
            self.0
        )
    }
}

impl std::error::Error for CurrencyCodeError {}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError(s.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for CurrencyCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// An amount in a particular currency, formatted with the currency symbol, thousands separators
/// and two decimals: e.g. `₹1,037.50` or `-$4.50`. Unknown currencies are prefixed with their code
/// and a space: `CHF 12.00`.
#[derive(Debug, Clone, PartialEq)]
pub struct Money {
    amount: f64,
    currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: f64, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0.0 { "-" } else { "" };
        let num = format_num::format_num!(",.2", self.amount.abs());
        match self.currency.symbol() {
            Some(symbol) => write!(f, "{sign}{symbol}{num}"),
            None => write!(f, "{sign}{} {num}", self.currency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(code(" eur ").as_str(), "EUR");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert!(CurrencyCode::from_str("").is_err());
        assert!(CurrencyCode::from_str("US").is_err());
        assert!(CurrencyCode::from_str("US1").is_err());
        assert!(CurrencyCode::from_str("USDX").is_err());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&code("gbp")).unwrap();
        assert_eq!(json, "\"GBP\"");
        let parsed: CurrencyCode = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(parsed, code("JPY"));
        assert!(serde_json::from_str::<CurrencyCode>("\"nope\"").is_err());
    }

    #[test]
    fn test_default_is_inr() {
        assert_eq!(CurrencyCode::default().as_str(), "INR");
    }

    #[test]
    fn test_money_display_known_symbol() {
        assert_eq!(Money::new(1037.5, code("INR")).to_string(), "₹1,037.50");
        assert_eq!(Money::new(-4.5, code("USD")).to_string(), "-$4.50");
        assert_eq!(Money::new(12.0, code("AUD")).to_string(), "A$12.00");
    }

    #[test]
    fn test_money_display_unknown_symbol() {
        assert_eq!(Money::new(1234.0, code("CHF")).to_string(), "CHF 1,234.00");
    }
}
