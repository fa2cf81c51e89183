//! Implements `RemoteStore` against a Supabase (PostgREST) `expenses` table.

use crate::api::RemoteStore;
use crate::model::{CurrencyCode, Expense};
use crate::Result;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{trace, warn};
use url::Url;

const EXPENSES_PATH: &str = "rest/v1/expenses";

/// Talks to the PostgREST endpoint of a Supabase project. Every request carries the project's
/// `apikey` and, when a user is signed in, their access token as the bearer token.
pub struct SupabaseRemote {
    client: reqwest::Client,
    table: Url,
    api_key: String,
    access_token: Option<String>,
}

impl SupabaseRemote {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid remote URL '{base_url}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let table = base
            .join(EXPENSES_PATH)
            .context("Unable to build the expenses table URL")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            client,
            table,
            api_key: api_key.into(),
            access_token,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder.header("apikey", &self.api_key).bearer_auth(token)
    }
}

#[async_trait::async_trait]
impl RemoteStore for SupabaseRemote {
    async fn create(&self, expense: &Expense, owner_id: &str) -> Result<()> {
        trace!("create {}", expense.id);
        let request = self
            .authorized(self.client.post(self.table.clone()))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&ExpenseRow::new(expense, owner_id));
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send create for expense {}", expense.id))?;
        check(response, "create").await
    }

    async fn update(&self, expense: &Expense, owner_id: &str) -> Result<()> {
        trace!("update {}", expense.id);
        let request = self
            .authorized(self.client.patch(self.table.clone()))
            .query(&[("id", format!("eq.{}", expense.id))])
            .header("Prefer", "return=minimal")
            .json(&ExpenseRow::new(expense, owner_id));
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send update for expense {}", expense.id))?;
        check(response, "update").await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        trace!("delete {id}");
        let response = self
            .authorized(self.client.delete(self.table.clone()))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .with_context(|| format!("Failed to send delete for expense {id}"))?;
        check(response, "delete").await
    }

    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Expense>> {
        trace!("fetch_all for {owner_id}");
        let response = self
            .authorized(self.client.get(self.table.clone()))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{owner_id}")),
                ("order", "date.desc".to_string()),
            ])
            .send()
            .await
            .context("Failed to send fetch for expenses")?;
        let response = ok(response, "fetch").await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Failed to parse the expenses response")?;

        // One malformed row should not hide all of the others.
        let mut expenses = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<ExpenseRow>(row) {
                Ok(row) => expenses.push(row.into_expense()),
                Err(e) => warn!("Skipping a remote expense row that could not be parsed: {e}"),
            }
        }
        Ok(expenses)
    }
}

/// Returns the response if its status is a success, otherwise an error carrying the status and
/// body.
async fn ok(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    bail!("Remote {what} failed with status {status}: {body}")
}

async fn check(response: Response, what: &str) -> Result<()> {
    ok(response, what).await.map(|_| ())
}

/// The snake_case row shape of the `expenses` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ExpenseRow {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    amount: f64,
    currency: CurrencyCode,
    category_id: String,
    date: NaiveDate,
    merchant: String,
    description: Option<String>,
    receipt_url: Option<String>,
    created_at: i64,
}

impl ExpenseRow {
    fn new(expense: &Expense, owner_id: &str) -> Self {
        Self {
            id: expense.id.clone(),
            user_id: Some(owner_id.to_string()),
            amount: expense.amount,
            currency: expense.currency.clone(),
            category_id: expense.category_id.clone(),
            date: expense.date,
            merchant: expense.merchant.clone(),
            description: expense.description.clone().filter(|d| !d.is_empty()),
            receipt_url: expense.receipt_url.clone().filter(|u| !u.is_empty()),
            created_at: expense.created_at,
        }
    }

    fn into_expense(self) -> Expense {
        Expense {
            id: self.id,
            amount: self.amount,
            currency: self.currency,
            category_id: self.category_id,
            date: self.date,
            merchant: self.merchant,
            description: self.description,
            receipt_url: self.receipt_url,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::expense::expense;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(server: &MockServer) -> SupabaseRemote {
        SupabaseRemote::new(
            &server.uri(),
            "anon-key",
            Some("user-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_posts_snake_case_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/expenses"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .and(body_partial_json(serde_json::json!({
                "id": "e1",
                "user_id": "u1",
                "category_id": "food",
                "amount": 20.0,
                "currency": "USD",
                "date": "2025-11-30",
                "created_at": 1_764_504_000_000_i64,
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        remote(&server)
            .create(&expense("e1", 20.0, "USD"), "u1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_filters_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/expenses"))
            .and(query_param("id", "eq.e2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        remote(&server)
            .update(&expense("e2", 3.0, "EUR"), "u1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/expenses"))
            .and(query_param("id", "eq.e3"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .expect(1)
            .mount(&server)
            .await;

        let err = remote(&server).delete("e3").await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("401"), "{message}");
        assert!(message.contains("JWT expired"), "{message}");
    }

    #[tokio::test]
    async fn test_fetch_all_maps_rows_and_skips_bad_ones() {
        let server = MockServer::start().await;
        let body = serde_json::json!([
            {
                "id": "a",
                "user_id": "u1",
                "amount": 12.5,
                "currency": "USD",
                "category_id": "food",
                "date": "2025-11-29",
                "merchant": "Uber",
                "description": null,
                "receipt_url": null,
                "created_at": 10
            },
            {
                "id": "b",
                "amount": "not a number"
            }
        ]);
        Mock::given(method("GET"))
            .and(path("/rest/v1/expenses"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let expenses = remote(&server).fetch_all("u1").await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].id, "a");
        assert_eq!(expenses[0].merchant, "Uber");
        assert_eq!(expenses[0].description, None);
    }

    #[test]
    fn test_base_url_with_path() {
        let remote = SupabaseRemote::new(
            "https://example.com/proxy",
            "k",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            remote.table.as_str(),
            "https://example.com/proxy/rest/v1/expenses"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(SupabaseRemote::new("not a url", "k", None, Duration::from_secs(1)).is_err());
    }
}
