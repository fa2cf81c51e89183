use crate::api::Mode;
use crate::args::{AddArgs, ScanArgs};
use crate::commands::{describe, open_engine, Out, Recorded, SyncOptions};
use crate::model::{Expense, ExpenseDraft, UNCATEGORIZED};
use crate::{utils, Config, Result};
use chrono::{Local, Utc};
use uuid::Uuid;

/// Records a new expense. Missing currency, category and date take their defaults.
pub async fn add(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: AddArgs,
) -> Result<Out<Recorded<Expense>>> {
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        amount: args.amount,
        currency: args
            .currency
            .unwrap_or_else(|| config.home_currency().clone()),
        category_id: args
            .category
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        date: args.date.unwrap_or_else(|| Local::now().date_naive()),
        merchant: args.merchant.trim().to_string(),
        description: args.description.filter(|d| !d.is_empty()),
        receipt_url: args.receipt_url.filter(|u| !u.is_empty()),
        created_at: Utc::now().timestamp_millis(),
    };
    record(config, mode, options, expense).await
}

/// Records an expense from a receipt-analysis draft stored as JSON at `args.file`.
pub async fn scan(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: ScanArgs,
) -> Result<Out<Recorded<Expense>>> {
    let draft: ExpenseDraft = utils::deserialize(&args.file).await?;
    let expense = draft.into_expense(
        config.home_currency(),
        Local::now().date_naive(),
        Utc::now().timestamp_millis(),
    )?;
    record(config, mode, options, expense).await
}

async fn record(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    expense: Expense,
) -> Result<Out<Recorded<Expense>>> {
    // Validate before touching the database.
    expense.validate()?;
    let engine = open_engine(&config, mode, options).await?;
    let outcome = engine.add(expense.clone()).await?;
    engine.shutdown();
    Ok(Out::new(
        describe("Added", &expense.id, &outcome),
        Recorded {
            record: expense,
            outcome,
        },
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::args::ListArgs;
    use crate::commands::{list, status};
    use crate::sync::MutationOutcome;
    use crate::test::TestEnv;

    pub(crate) fn add_args(amount: f64, merchant: &str) -> AddArgs {
        AddArgs {
            amount,
            merchant: merchant.to_string(),
            currency: None,
            category: None,
            date: None,
            description: None,
            receipt_url: None,
        }
    }

    #[tokio::test]
    async fn test_add_local_only() {
        let env = TestEnv::new().await;
        let out = add(env.config(), Mode::Test, &TestEnv::local(), add_args(250.0, "Bakery"))
            .await
            .unwrap();
        let recorded = out.structure().unwrap();
        assert_eq!(recorded.outcome, MutationOutcome::LocalOnly);
        assert_eq!(recorded.record.currency.as_str(), "INR");
        assert_eq!(recorded.record.category_id, UNCATEGORIZED);

        let listed = list(env.config(), Mode::Test, &TestEnv::local(), ListArgs::default())
            .await
            .unwrap();
        assert_eq!(listed.structure().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_offline_is_queued() {
        let env = TestEnv::new().await;
        let out = add(
            env.config(),
            Mode::Test,
            &TestEnv::signed_in(false),
            add_args(20.0, "Test"),
        )
        .await
        .unwrap();
        assert!(matches!(
            out.structure().unwrap().outcome,
            MutationOutcome::Queued { .. }
        ));
        let pending = status(env.config(), Mode::Test, &TestEnv::signed_in(false))
            .await
            .unwrap();
        assert_eq!(pending.structure().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_online_is_synced() {
        let env = TestEnv::new().await;
        let out = add(
            env.config(),
            Mode::Test,
            &TestEnv::signed_in(true),
            add_args(20.0, "Test"),
        )
        .await
        .unwrap();
        assert_eq!(out.structure().unwrap().outcome, MutationOutcome::Synced);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_amount() {
        let env = TestEnv::new().await;
        let result = add(env.config(), Mode::Test, &TestEnv::local(), add_args(0.0, "Bakery")).await;
        assert!(result.is_err());
        let listed = list(env.config(), Mode::Test, &TestEnv::local(), ListArgs::default())
            .await
            .unwrap();
        assert!(listed.structure().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_fills_defaults() {
        let env = TestEnv::with_currency("USD").await;
        let file = env.dir().join("draft.json");
        utils::write(
            &file,
            r#"{"merchant": "Corner Store", "amount": 8.75, "currency": null, "date": null}"#,
        )
        .await
        .unwrap();

        let out = scan(
            env.config(),
            Mode::Test,
            &TestEnv::local(),
            ScanArgs { file },
        )
        .await
        .unwrap();
        let expense = &out.structure().unwrap().record;
        assert_eq!(expense.currency.as_str(), "USD");
        assert_eq!(expense.amount, 8.75);
        assert_eq!(expense.merchant, "Corner Store");
    }

    #[tokio::test]
    async fn test_scan_without_amount_fails() {
        let env = TestEnv::new().await;
        let file = env.dir().join("draft.json");
        utils::write(&file, r#"{"merchant": "Corner Store"}"#)
            .await
            .unwrap();
        let result = scan(env.config(), Mode::Test, &TestEnv::local(), ScanArgs { file }).await;
        assert!(result.is_err());
    }
}
