//! Implements `RateSource` using the exchangerate-api.com pair endpoint.

use crate::api::RateSource;
use crate::model::CurrencyCode;
use crate::Result;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

/// The public endpoint of exchangerate-api.com.
pub const DEFAULT_RATE_API_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Looks up rates with `GET {base}/{key}/pair/{from}/{to}`.
pub struct ExchangeRateApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExchangeRateApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

/// The body of a pair response. On failure `result` is `"error"` and `error-type` explains why.
#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    conversion_rate: Option<f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

#[async_trait::async_trait]
impl RateSource for ExchangeRateApi {
    async fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64> {
        let url = format!("{}/{}/pair/{from}/{to}", self.base_url, self.api_key);
        trace!("fetching rate {from}->{to}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request the {from}->{to} exchange rate"))?;
        let status = response.status();
        let body: PairResponse = response.json().await.with_context(|| {
            format!("Unable to parse the {from}->{to} exchange rate response (status {status})")
        })?;
        if body.result != "success" {
            bail!(
                "The rate source returned '{}' for {from}->{to}: {}",
                body.result,
                body.error_type.as_deref().unwrap_or("unknown error")
            );
        }
        body.conversion_rate
            .with_context(|| format!("The {from}->{to} response did not include a rate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::from_str(s).unwrap()
    }

    fn api(server: &MockServer) -> ExchangeRateApi {
        ExchangeRateApi::new(format!("{}/v6/", server.uri()), "KEY", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/KEY/pair/USD/INR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "success",
                "base_code": "USD",
                "target_code": "INR",
                "conversion_rate": 83.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rate = api(&server)
            .fetch_rate(&code("USD"), &code("INR"))
            .await
            .unwrap();
        assert_eq!(rate, 83.0);
    }

    #[tokio::test]
    async fn test_error_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/KEY/pair/EUR/INR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "error",
                "error-type": "invalid-key"
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .fetch_rate(&code("EUR"), &code("INR"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid-key"), "{err}");
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = api(&server)
            .fetch_rate(&code("GBP"), &code("INR"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("502"), "{err:#}");
    }
}
