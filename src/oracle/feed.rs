//! Price feed port and HTTP implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from the external price feed. These never escape the oracle; the
/// oracle degrades to cached or fallback rates instead.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(String),

    #[error("feed returned status {0}")]
    Status(u16),

    #[error("feed response missing rate for {asset}/{currency}")]
    MissingRate { asset: String, currency: String },

    #[error("feed returned non-positive rate {0}")]
    NonPositive(Decimal),
}

/// External exchange-rate source.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the current crypto/local-currency rate (1 unit = X local).
    async fn fetch_rate(&self) -> Result<Decimal, FeedError>;

    /// Tag recorded on snapshots served from this feed.
    fn source(&self) -> &str;
}

/// HTTP feed speaking the simple-price shape:
/// `{ "<asset>": { "<currency>": <positive number> } }`.
pub struct HttpPriceFeed {
    client: reqwest::Client,
    endpoint: String,
    asset_id: String,
    currency: String,
    source: String,
}

impl HttpPriceFeed {
    pub fn new(
        endpoint: String,
        asset_id: String,
        currency: String,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            asset_id,
            currency,
            source: "coingecko".to_string(),
        }
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch_rate(&self) -> Result<Decimal, FeedError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ids", self.asset_id.as_str()),
                ("vs_currencies", self.currency.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body: HashMap<String, HashMap<String, Decimal>> = response
            .json()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        let rate = body
            .get(&self.asset_id)
            .and_then(|m| m.get(&self.currency))
            .copied()
            .ok_or_else(|| FeedError::MissingRate {
                asset: self.asset_id.clone(),
                currency: self.currency.clone(),
            })?;

        if rate <= Decimal::ZERO {
            return Err(FeedError::NonPositive(rate));
        }

        Ok(rate)
    }

    fn source(&self) -> &str {
        &self.source
    }
}
