use crate::model::CurrencyCode;
use crate::Result;
use anyhow::{bail, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single recorded expense.
///
/// Serialized in camelCase so that the local snapshot keeps the same shape as records exported
/// by earlier versions of the app. `date` is a calendar date written as `YYYY-MM-DD` and
/// `created_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub category_id: String,
    pub date: NaiveDate,
    pub merchant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub created_at: i64,
}

impl Expense {
    /// Checks the invariants every stored expense must satisfy. This runs before any mutation
    /// begins, so a failure here leaves all state untouched.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.id.trim().is_empty(), "Expense id must not be empty");
        if !self.amount.is_finite() || self.amount <= 0.0 {
            bail!(
                "Expense amount must be a positive number, got {}",
                self.amount
            );
        }
        ensure!(
            !self.merchant.trim().is_empty(),
            "Expense merchant must not be empty"
        );
        ensure!(
            !self.category_id.trim().is_empty(),
            "Expense category must not be empty"
        );
        Ok(())
    }

    /// The `YYYY-MM` month this expense falls in.
    pub fn month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("Invalid date '{s}', expected YYYY-MM-DD: {e}"))
}

#[cfg(test)]
pub(crate) fn expense(id: &str, amount: f64, currency: &str) -> Expense {
    use std::str::FromStr;
    Expense {
        id: id.to_string(),
        amount,
        currency: CurrencyCode::from_str(currency).unwrap(),
        category_id: "food".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
        merchant: "Test".to_string(),
        description: None,
        receipt_url: None,
        created_at: 1_764_504_000_000,
    }
}
