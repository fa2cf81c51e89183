use crate::model::{category_name, Expense};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Narrows an expense listing. Every criterion that is set must match; an empty filter matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Case-insensitive substring of the merchant, description or category name.
    #[serde(default)]
    pub search: String,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if self.start_date.is_some_and(|start| expense.date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| expense.date > end) {
            return false;
        }
        if !self.category_ids.is_empty() && !self.category_ids.contains(&expense.category_id) {
            return false;
        }
        if self.min_amount.is_some_and(|min| expense.amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| expense.amount > max) {
            return false;
        }
        let query = self.search.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        expense.merchant.to_lowercase().contains(&query)
            || expense
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
            || category_name(&expense.category_id)
                .to_lowercase()
                .contains(&query)
    }

    /// Returns the matching expenses, newest date first.
    pub fn apply(&self, expenses: &[Expense]) -> Vec<Expense> {
        let mut out: Vec<Expense> = expenses
            .iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        out
    }
}
