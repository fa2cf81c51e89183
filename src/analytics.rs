//! Spending aggregates for a collection of expenses that is already in one currency.

use crate::model::{category_name, Budget, Expense};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Total spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category_id: String,
    pub name: String,
    pub total: f64,
}

/// How much of a monthly budget has been used. `percent` is capped at 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUsage {
    pub category_id: String,
    pub name: String,
    pub limit: f64,
    pub spent: f64,
    pub percent: f64,
}

/// The figures shown for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub count: usize,
    pub categories: Vec<CategoryTotal>,
    pub daily: BTreeMap<NaiveDate, f64>,
    pub budgets: Vec<BudgetUsage>,
}

impl Summary {
    pub fn new(expenses: &[Expense], budgets: &[Budget], month: &str) -> Self {
        let in_month: Vec<Expense> = expenses
            .iter()
            .filter(|e| e.month() == month)
            .cloned()
            .collect();
        Self {
            month: month.to_string(),
            total: month_total(expenses, month),
            count: in_month.len(),
            categories: category_totals(&in_month),
            daily: daily_totals(&in_month),
            budgets: budget_usage(budgets, expenses, month),
        }
    }
}

/// Sum of the amounts dated in `month` (`YYYY-MM`).
pub fn month_total(expenses: &[Expense], month: &str) -> f64 {
    expenses
        .iter()
        .filter(|e| e.month() == month)
        .map(|e| e.amount)
        .sum()
}

/// Totals per category, largest first.
pub fn category_totals(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for e in expenses {
        *totals.entry(e.category_id.as_str()).or_default() += e.amount;
    }
    let mut totals: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(id, total)| CategoryTotal {
            category_id: id.to_string(),
            name: category_name(id).to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    totals
}

/// Totals per day, in date order.
pub fn daily_totals(expenses: &[Expense]) -> BTreeMap<NaiveDate, f64> {
    let mut daily = BTreeMap::new();
    for e in expenses {
        *daily.entry(e.date).or_insert(0.0) += e.amount;
    }
    daily
}

/// Usage of each budget in `month`. Budgets with nothing spent are left out.
pub fn budget_usage(budgets: &[Budget], expenses: &[Expense], month: &str) -> Vec<BudgetUsage> {
    budgets
        .iter()
        .map(|b| {
            let spent: f64 = expenses
                .iter()
                .filter(|e| e.category_id == b.category_id && e.month() == month)
                .map(|e| e.amount)
                .sum();
            let percent = if b.limit > 0.0 {
                (spent / b.limit * 100.0).min(100.0)
            } else {
                100.0
            };
            BudgetUsage {
                category_id: b.category_id.clone(),
                name: category_name(&b.category_id).to_string(),
                limit: b.limit,
                spent,
                percent,
            }
        })
        .filter(|u| u.spent > 0.0)
        .collect()
}
