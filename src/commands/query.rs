//! Read-only commands: listing, conversion, monthly summary and CSV export.

use crate::analytics::Summary;
use crate::api::Mode;
use crate::args::{ConvertArgs, ExportArgs, ListArgs, SummaryArgs};
use crate::commands::{normalizer, open_engine, Out, SyncOptions};
use crate::model::{category_name, default_budgets, Budget, CurrencyCode, Expense, Money};
use crate::{export as csv_export, utils, Config, Result};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Lists the expenses that match the filter, newest first. With `--currency` the amounts are
/// converted; the total is always in that currency or the display currency.
pub async fn list(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: ListArgs,
) -> Result<Out<Vec<Expense>>> {
    let engine = open_engine(&config, mode, options).await?;
    let expenses = args.filter().apply(&engine.expenses().await);
    engine.shutdown();

    let target = args
        .currency
        .clone()
        .unwrap_or_else(|| config.display_currency().clone());
    let converted = normalizer(&config, mode)?
        .convert_collection(&expenses, &target)
        .await;
    let total: f64 = converted.iter().map(|e| e.amount).sum();

    let shown = if args.currency.is_some() {
        converted
    } else {
        expenses
    };
    let mut message = format!(
        "{} expenses, total {}",
        shown.len(),
        Money::new(total, target)
    );
    for e in &shown {
        message.push_str(&format!(
            "\n  {}  {:<24} {:>14}  {:<16} {}",
            e.date,
            e.merchant,
            Money::new(e.amount, e.currency.clone()).to_string(),
            category_name(&e.category_id),
            e.id
        ));
    }
    Ok(Out::new(message, shown))
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub amount: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub converted: f64,
}

/// Converts an amount. An unavailable rate converts 1:1.
pub async fn convert(config: Config, mode: Mode, args: ConvertArgs) -> Result<Out<Conversion>> {
    let converted = normalizer(&config, mode)?
        .convert(args.amount, &args.from, &args.to)
        .await;
    Ok(Out::new(
        format!(
            "{} = {}",
            Money::new(args.amount, args.from.clone()),
            Money::new(converted, args.to.clone())
        ),
        Conversion {
            amount: args.amount,
            from: args.from,
            to: args.to,
            converted,
        },
    ))
}

/// Totals, category breakdown and budget usage for one month, all in one currency.
pub async fn summary(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: SummaryArgs,
) -> Result<Out<Summary>> {
    let month = match args.month {
        Some(month) => {
            NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
                .with_context(|| format!("'{month}' is not a month, expected YYYY-MM"))?;
            month
        }
        None => Local::now().format("%Y-%m").to_string(),
    };
    let target = args
        .currency
        .unwrap_or_else(|| config.display_currency().clone());

    let engine = open_engine(&config, mode, options).await?;
    let expenses = engine.expenses().await;
    engine.shutdown();

    let normalizer = normalizer(&config, mode)?;
    let converted = normalizer.convert_collection(&expenses, &target).await;
    // Budgets are kept in the home currency.
    let rate = normalizer.rate(config.home_currency(), &target).await;
    let budgets: Vec<Budget> = default_budgets()
        .into_iter()
        .map(|b| Budget {
            limit: b.limit * rate,
            ..b
        })
        .collect();

    let summary = Summary::new(&converted, &budgets, &month);
    let mut message = format!(
        "{}: {} across {} expenses",
        summary.month,
        Money::new(summary.total, target.clone()),
        summary.count
    );
    for c in &summary.categories {
        message.push_str(&format!(
            "\n  {:<16} {}",
            c.name,
            Money::new(c.total, target.clone())
        ));
    }
    for b in &summary.budgets {
        message.push_str(&format!(
            "\n  budget {:<16} {} of {} ({:.0}%)",
            b.name,
            Money::new(b.spent, target.clone()),
            Money::new(b.limit, target.clone()),
            b.percent
        ));
    }
    Ok(Out::new(message, summary))
}

/// Writes every expense as CSV, newest first, to `--output` or stdout.
pub async fn export(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: ExportArgs,
) -> Result<Out<()>> {
    let engine = open_engine(&config, mode, options).await?;
    let expenses = crate::model::ExpenseFilter::default().apply(&engine.expenses().await);
    engine.shutdown();

    let csv = csv_export::to_csv(&expenses)?;
    match args.output {
        Some(path) => {
            utils::write(&path, csv).await?;
            Ok(format!("Exported {} expenses to {}", expenses.len(), path.display()).into())
        }
        None => {
            print!("{csv}");
            Ok(format!("Exported {} expenses", expenses.len()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::AddArgs;
    use crate::commands::add;
    use crate::test::TestEnv;
    use std::str::FromStr;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::from_str(s).unwrap()
    }

    async fn seed(env: &TestEnv) {
        let items = [
            (459.75, "INR", "food", "Swiggy", "2025-11-02"),
            (12.50, "USD", "shopping", "Amazon", "2025-11-05"),
            (28.99, "EUR", "food", "Cafe Paris", "2025-11-20"),
            (1200.0, "INR", "transport", "Uber", "2025-10-30"),
        ];
        for (amount, currency, category, merchant, date) in items {
            let args = AddArgs {
                amount,
                merchant: merchant.to_string(),
                currency: Some(code(currency)),
                category: Some(category.to_string()),
                date: Some(NaiveDate::from_str(date).unwrap()),
                description: None,
                receipt_url: None,
            };
            add(env.config(), Mode::Test, &TestEnv::local(), args)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_with_filter_and_conversion() {
        let env = TestEnv::new().await;
        seed(&env).await;

        let args = ListArgs {
            categories: vec!["food".to_string()],
            currency: Some(code("INR")),
            ..ListArgs::default()
        };
        let out = list(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        let shown = out.structure().unwrap();
        assert_eq!(shown.len(), 2);
        // Newest first.
        assert_eq!(shown[0].merchant, "Cafe Paris");
        assert_eq!(shown[0].amount, 28.99 * 88.0);
        assert!(shown.iter().all(|e| e.currency.as_str() == "INR"));
    }

    #[tokio::test]
    async fn test_list_keeps_original_currencies() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let out = list(env.config(), Mode::Test, &TestEnv::local(), ListArgs::default())
            .await
            .unwrap();
        let shown = out.structure().unwrap();
        assert_eq!(shown.len(), 4);
        assert!(shown.iter().any(|e| e.currency.as_str() == "USD"));
        assert!(out.message().starts_with("4 expenses, total ₹"));
    }

    #[tokio::test]
    async fn test_convert() {
        let env = TestEnv::new().await;
        let args = ConvertArgs {
            amount: 10.0,
            from: code("USD"),
            to: code("INR"),
        };
        let out = convert(env.config(), Mode::Test, args).await.unwrap();
        assert_eq!(out.structure().unwrap().converted, 840.0);

        // No rate for this pair in test mode: identity.
        let args = ConvertArgs {
            amount: 10.0,
            from: code("CHF"),
            to: code("INR"),
        };
        let out = convert(env.config(), Mode::Test, args).await.unwrap();
        assert_eq!(out.structure().unwrap().converted, 10.0);
    }

    #[tokio::test]
    async fn test_summary() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let args = SummaryArgs {
            month: Some("2025-11".to_string()),
            currency: None,
        };
        let out = summary(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        let s = out.structure().unwrap();
        assert_eq!(s.count, 3);
        let expected = 459.75 + 12.50 * 84.0 + 28.99 * 88.0;
        assert!((s.total - expected).abs() < 1e-9);
        let food = s.budgets.iter().find(|b| b.category_id == "food").unwrap();
        assert_eq!(food.limit, 15000.0);
    }

    #[tokio::test]
    async fn test_summary_rejects_bad_month() {
        let env = TestEnv::new().await;
        let args = SummaryArgs {
            month: Some("November".to_string()),
            currency: None,
        };
        assert!(summary(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_export_to_file() {
        let env = TestEnv::new().await;
        seed(&env).await;
        let path = env.dir().join("out.csv");
        export(
            env.config(),
            Mode::Test,
            &TestEnv::local(),
            ExportArgs {
                output: Some(path.clone()),
            },
        )
        .await
        .unwrap();
        let csv = utils::read(&path).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("2025-11-20,Cafe Paris,Food & Dining,28.99,EUR"));
    }
}
