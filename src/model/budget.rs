use serde::{Deserialize, Serialize};

/// An expense category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A monthly spending limit for one category, in the display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub category_id: String,
    pub limit: f64,
}

/// The built-in categories as `(id, name)`.
pub const CATEGORIES: &[(&str, &str)] = &[
    ("food", "Food & Dining"),
    ("transport", "Transportation"),
    ("housing", "Housing"),
    ("utilities", "Utilities"),
    ("health", "Health"),
    ("shopping", "Shopping"),
    ("work", "Work"),
    ("entertainment", "Entertainment"),
];

const DEFAULT_BUDGETS: &[(&str, f64)] = &[
    ("food", 15000.0),
    ("transport", 5000.0),
    ("housing", 25000.0),
    ("shopping", 8000.0),
];

pub fn default_categories() -> Vec<Category> {
    CATEGORIES
        .iter()
        .map(|(id, name)| Category {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

pub fn default_budgets() -> Vec<Budget> {
    DEFAULT_BUDGETS
        .iter()
        .map(|(id, limit)| Budget {
            category_id: id.to_string(),
            limit: *limit,
        })
        .collect()
}

/// The display name of a category id, falling back to the id itself.
pub fn category_name(category_id: &str) -> &str {
    CATEGORIES
        .iter()
        .find(|(id, _)| *id == category_id)
        .map(|(_, name)| *name)
        .unwrap_or(category_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_categories().len(), 8);
        let budgets = default_budgets();
        assert_eq!(budgets.len(), 4);
        assert_eq!(budgets[0].category_id, "food");
        assert_eq!(budgets[0].limit, 15000.0);
    }

    #[test]
    fn test_category_name() {
        assert_eq!(category_name("transport"), "Transportation");
        assert_eq!(category_name("pets"), "pets");
    }
}
