//! Remote rate feed
//!
//! One HTTP GET against the Open Exchange Rates "latest" endpoint,
//! authenticated by an opaque application id, returning USD-pivot factors.
//! The trait seam exists so the rate store can be exercised against a
//! scripted feed in tests.

use crate::constants::{OPEN_EXCHANGE_RATES_URL, REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::FeedError;
use crate::types::PivotRates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Open Exchange Rates response for the "latest" endpoint
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

/// Trait for remote rate feeds
#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Fetches the USD-pivot factors for all required currencies
    ///
    /// # Returns
    /// The pivot rates, or an error if the fetch fails or a required
    /// currency is missing from the payload
    async fn fetch_pivot_rates(&self) -> Result<PivotRates, FeedError>;

    /// Returns the name of this feed
    fn feed_name(&self) -> &'static str;
}

/// Open Exchange Rates feed
pub struct OpenExchangeRatesFeed {
    client: Client,
    app_id: String,
}

impl OpenExchangeRatesFeed {
    /// Creates a new feed authenticated with the given application id
    pub fn new(app_id: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(FeedError::Network)?;

        Ok(Self {
            client,
            app_id: app_id.into(),
        })
    }
}

/// Extracts the four required currencies out of a raw rate map.
///
/// A payload missing any required currency is a fetch failure, not a
/// partial success.
fn pivot_rates_from(rates: &HashMap<String, f64>) -> Result<PivotRates, FeedError> {
    fn required(rates: &HashMap<String, f64>, code: &'static str) -> Result<f64, FeedError> {
        rates
            .get(code)
            .copied()
            .ok_or(FeedError::MissingCurrency(code))
    }

    Ok(PivotRates {
        huf: required(rates, "HUF")?,
        eur: required(rates, "EUR")?,
        rsd: required(rates, "RSD")?,
        rub: required(rates, "RUB")?,
    })
}

#[async_trait]
impl RateFeed for OpenExchangeRatesFeed {
    async fn fetch_pivot_rates(&self) -> Result<PivotRates, FeedError> {
        let url = format!("{}?app_id={}", OPEN_EXCHANGE_RATES_URL, self.app_id);
        tracing::debug!(feed = self.feed_name(), "Fetching pivot rates");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FeedError::Network)?;

        if !response.status().is_success() {
            return Err(FeedError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response.text().await.map_err(FeedError::Network)?;
        let parsed: LatestRatesResponse = serde_json::from_str(&body).map_err(|e| {
            FeedError::InvalidResponse(format!("Failed to parse rate payload: {e}"))
        })?;

        let pivot = pivot_rates_from(&parsed.rates)?;
        tracing::debug!(
            feed = self.feed_name(),
            huf = pivot.huf,
            eur = pivot.eur,
            rsd = pivot.rsd,
            rub = pivot.rub,
            "Fetched pivot rates"
        );
        Ok(pivot)
    }

    fn feed_name(&self) -> &'static str {
        "openexchangerates"
    }
}
