use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::ExternalCallError;

/// Where spot exchange rates come from.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn rate(&self, from: &str, to: &str) -> Result<f64, ExternalCallError>;

    /// Informational reachability probe, never used to gate conversions.
    async fn ping(&self) -> bool;
}

#[derive(Debug, Deserialize)]
pub struct RatesResponse {
    #[serde(default)]
    pub rates: HashMap<String, f64>,
    pub success: bool,
}

/// Client for the exchangerates_data HTTP API.
pub struct ExchangeRateClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ExchangeRateClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, ExternalCallError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ExternalCallError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ExternalCallError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "apiKey",
            HeaderValue::from_str(api_key)
                .map_err(|e| ExternalCallError::InvalidUrl(format!("invalid api key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .user_agent("casino-enrichment-pipeline")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn latest_url(&self, from: &str, to: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("latest");
        }
        url.query_pairs_mut()
            .append_pair("symbols", to)
            .append_pair("base", from);
        url
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn rate(&self, from: &str, to: &str) -> Result<f64, ExternalCallError> {
        let url = self.latest_url(from, to);
        debug!(%url, "requesting exchange rate");

        let response: RatesResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            return Err(ExternalCallError::ExchangeUnsuccessful {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }

        response
            .rates
            .get(to)
            .copied()
            .ok_or_else(|| ExternalCallError::RateMissing(to.to_owned()))
    }

    async fn ping(&self) -> bool {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "exchange rate API ping failed");
                false
            }
        }
    }
}
