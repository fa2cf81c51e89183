//! CSV export of expenses.

use crate::model::{category_name, Expense};
use crate::Result;
use anyhow::Context;
use std::io::Write;

/// The header row of an export.
pub const HEADERS: [&str; 6] = [
    "Date",
    "Merchant",
    "Category",
    "Amount",
    "Currency",
    "Description",
];

/// Writes `expenses` as CSV, one row per expense, amounts with two decimals.
pub fn write_csv<W: Write>(writer: W, expenses: &[Expense]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADERS)
        .context("Unable to write the CSV header")?;
    for e in expenses {
        csv.write_record([
            e.date.format("%Y-%m-%d").to_string(),
            e.merchant.clone(),
            category_name(&e.category_id).to_string(),
            format!("{:.2}", e.amount),
            e.currency.to_string(),
            e.description.clone().unwrap_or_default(),
        ])
        .with_context(|| format!("Unable to write expense {} as CSV", e.id))?;
    }
    csv.flush().context("Unable to flush the CSV output")?;
    Ok(())
}

/// Renders `expenses` as a CSV string.
pub fn to_csv(expenses: &[Expense]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, expenses)?;
    String::from_utf8(buf).context("The CSV output is not UTF-8")
}
