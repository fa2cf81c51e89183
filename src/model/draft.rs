//! The partial expense produced by receipt analysis.
//!
//! Receipt scanning is best-effort: any of its fields may be missing or `null`. A draft is turned
//! into a real `Expense` by filling in defaults, and only the fields without a sensible default
//! (amount and merchant) can make that fail.

use crate::model::{CurrencyCode, Expense};
use crate::Result;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The category used when the receipt did not suggest one.
pub const UNCATEGORIZED: &str = "other";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl ExpenseDraft {
    /// Builds a new expense with a fresh id.
    ///
    /// - A missing or unparseable currency becomes `home_currency`.
    /// - A missing or unparseable date becomes `today`.
    /// - A missing category becomes `"other"`.
    ///
    /// # Errors
    /// - The amount is missing, or the resulting expense fails validation.
    pub fn into_expense(
        self,
        home_currency: &CurrencyCode,
        today: NaiveDate,
        created_at: i64,
    ) -> Result<Expense> {
        let amount = self
            .amount
            .context("The receipt did not contain an amount")?;
        let currency = self
            .currency
            .as_deref()
            .and_then(|c| CurrencyCode::from_str(c).ok())
            .unwrap_or_else(|| home_currency.clone());
        let date = self
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .unwrap_or(today);
        let category_id = self
            .category_id
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            amount,
            currency,
            category_id,
            date,
            merchant: self.merchant.unwrap_or_default().trim().to_string(),
            description: self.description.filter(|d| !d.is_empty()),
            receipt_url: self.receipt_url.filter(|u| !u.is_empty()),
            created_at,
        };
        expense.validate()?;
        Ok(expense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
    }

    fn inr() -> CurrencyCode {
        CurrencyCode::from_str("INR").unwrap()
    }

    #[test]
    fn test_full_draft() {
        let json = r#"{
            "merchant": "Zomato",
            "amount": 459.75,
            "date": "2025-11-30",
            "categoryId": "food",
            "currency": "usd"
        }"#;
        let draft: ExpenseDraft = serde_json::from_str(json).unwrap();
        let e = draft.into_expense(&inr(), today(), 5).unwrap();
        assert_eq!(e.merchant, "Zomato");
        assert_eq!(e.amount, 459.75);
        assert_eq!(e.currency.as_str(), "USD");
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());
        assert_eq!(e.category_id, "food");
        assert_eq!(e.created_at, 5);
        assert!(!e.id.is_empty());
    }

    #[test]
    fn test_missing_currency_defaults_to_home() {
        let json = r#"{"merchant": "Uber", "amount": 12.5, "currency": null}"#;
        let draft: ExpenseDraft = serde_json::from_str(json).unwrap();
        let e = draft.into_expense(&inr(), today(), 0).unwrap();
        assert_eq!(e.currency, inr());
        assert_eq!(e.date, today());
        assert_eq!(e.category_id, UNCATEGORIZED);
    }

    #[test]
    fn test_garbage_date_defaults_to_today() {
        let draft = ExpenseDraft {
            merchant: Some("Lidl".to_string()),
            amount: Some(28.99),
            date: Some("yesterday-ish".to_string()),
            ..Default::default()
        };
        let e = draft.into_expense(&inr(), today(), 0).unwrap();
        assert_eq!(e.date, today());
    }

    #[test]
    fn test_missing_amount_is_an_error() {
        let draft = ExpenseDraft {
            merchant: Some("Lidl".to_string()),
            ..Default::default()
        };
        assert!(draft.into_expense(&inr(), today(), 0).is_err());
    }

    #[test]
    fn test_missing_merchant_is_an_error() {
        let draft = ExpenseDraft {
            amount: Some(3.0),
            ..Default::default()
        };
        assert!(draft.into_expense(&inr(), today(), 0).is_err());
    }

    #[test]
    fn test_empty_object() {
        let draft: ExpenseDraft = serde_json::from_str("{}").unwrap();
        assert_eq!(draft, ExpenseDraft::default());
    }
}
