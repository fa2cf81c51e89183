use crate::api::Mode;
use crate::args::UpdateArgs;
use crate::commands::{describe, open_engine, Out, Recorded, SyncOptions};
use crate::model::Expense;
use crate::{Config, Result};
use anyhow::Context;

/// Changes the given fields of an existing expense. The whole record is written, so the last
/// writer wins on the remote side.
pub async fn update(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: UpdateArgs,
) -> Result<Out<Recorded<Expense>>> {
    let engine = open_engine(&config, mode, options).await?;
    let mut expense = engine
        .get(&args.id)
        .await
        .with_context(|| format!("There is no expense with id '{}'", args.id))?;

    if let Some(amount) = args.amount {
        expense.amount = amount;
    }
    if let Some(merchant) = args.merchant {
        expense.merchant = merchant.trim().to_string();
    }
    if let Some(currency) = args.currency {
        expense.currency = currency;
    }
    if let Some(category) = args.category {
        expense.category_id = category;
    }
    if let Some(date) = args.date {
        expense.date = date;
    }
    if let Some(description) = args.description {
        expense.description = Some(description).filter(|d| !d.is_empty());
    }
    if let Some(receipt_url) = args.receipt_url {
        expense.receipt_url = Some(receipt_url).filter(|u| !u.is_empty());
    }

    let outcome = engine.update(expense.clone()).await?;
    engine.shutdown();
    Ok(Out::new(
        describe("Updated", &expense.id, &outcome),
        Recorded {
            record: expense,
            outcome,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add;
    use crate::commands::add::tests::add_args;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let env = TestEnv::new().await;
        let added = add(env.config(), Mode::Test, &TestEnv::local(), add_args(250.0, "Bakery"))
            .await
            .unwrap();
        let original = added.structure().unwrap().record.clone();

        let mut args = UpdateArgs::new(&original.id);
        args.amount = Some(300.0);
        args.description = Some("birthday cake".to_string());
        let out = update(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        let updated = &out.structure().unwrap().record;
        assert_eq!(updated.amount, 300.0);
        assert_eq!(updated.merchant, "Bakery");
        assert_eq!(updated.description.as_deref(), Some("birthday cake"));
        assert_eq!(updated.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_update_receipt_url() {
        let env = TestEnv::new().await;
        let mut args = add_args(250.0, "Bakery");
        args.receipt_url = Some("https://receipts.example/wrong.jpg".to_string());
        let added = add(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        let id = added.structure().unwrap().record.id.clone();

        let mut args = UpdateArgs::new(&id);
        args.receipt_url = Some("https://receipts.example/right.jpg".to_string());
        let out = update(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        assert_eq!(
            out.structure().unwrap().record.receipt_url.as_deref(),
            Some("https://receipts.example/right.jpg")
        );

        let mut args = UpdateArgs::new(&id);
        args.receipt_url = Some(String::new());
        let out = update(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().record.receipt_url, None);
    }

    #[tokio::test]
    async fn test_update_validates() {
        let env = TestEnv::new().await;
        let added = add(env.config(), Mode::Test, &TestEnv::local(), add_args(250.0, "Bakery"))
            .await
            .unwrap();
        let mut args = UpdateArgs::new(&added.structure().unwrap().record.id);
        args.merchant = Some("  ".to_string());
        assert!(update(env.config(), Mode::Test, &TestEnv::local(), args)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let env = TestEnv::new().await;
        let result = update(
            env.config(),
            Mode::Test,
            &TestEnv::local(),
            UpdateArgs::new("missing"),
        )
        .await;
        assert!(result.is_err());
    }
}
