//! Types that represent the core data model, such as `Expense` and `PendingOperation`.
mod budget;
mod currency;
mod draft;
pub(crate) mod expense;
mod filter;
mod operation;

pub use budget::{category_name, default_budgets, default_categories, Budget, Category};
pub use currency::{CurrencyCode, CurrencyCodeError, Money, CURRENCIES, DEFAULT_CURRENCY};
pub use draft::{ExpenseDraft, UNCATEGORIZED};
pub use expense::{parse_date, Expense};
pub use filter::ExpenseFilter;
pub use operation::{MalformedOperation, Operation, OperationId, OperationKind, PendingOperation};
