//! ETH/local-currency rate oracle with a bounded-TTL cache.
//!
//! # Degradation order
//! ```text
//! unexpired cache  → Cached
//! feed fetch ok    → Fresh (snapshot stored)
//! feed down, cache → Stale (served regardless of age)
//! feed down, empty → Fallback (fixed constant)
//! ```
//!
//! The oracle never returns an error: a conversion must always be
//! computable, degrading in accuracy rather than failing.

pub mod feed;

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::observability::metrics;

pub use feed::{FeedError, HttpPriceFeed, PriceFeed};

/// Where a served rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOrigin {
    /// Just fetched from the feed.
    Fresh,
    /// Cached snapshot within its TTL.
    Cached,
    /// Cached snapshot past its TTL, served because the feed is down.
    Stale,
    /// Hard-coded constant, served because the feed is down and no
    /// snapshot exists.
    Fallback,
}

impl RateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateOrigin::Fresh => "fresh",
            RateOrigin::Cached => "cached",
            RateOrigin::Stale => "stale",
            RateOrigin::Fallback => "fallback",
        }
    }
}

/// A stored rate observation.
#[derive(Debug, Clone)]
struct RateSnapshot {
    rate: Decimal,
    fetched_at: Instant,
    source: String,
}

/// Rate returned to callers, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuote {
    pub rate: Decimal,
    pub origin: RateOrigin,
    pub source: String,
}

/// Shared, TTL-bounded rate cache over an injected price feed.
pub struct RateOracle {
    feed: Arc<dyn PriceFeed>,
    cache: RwLock<Option<RateSnapshot>>,
    ttl: Duration,
    fallback_rate: Decimal,
}

impl RateOracle {
    pub fn new(feed: Arc<dyn PriceFeed>, ttl: Duration, fallback_rate: Decimal) -> Self {
        Self {
            feed,
            cache: RwLock::new(None),
            ttl,
            fallback_rate,
        }
    }

    /// Current conversion rate (1 crypto unit = X local currency).
    ///
    /// Concurrent cache misses may each hit the feed; the fetch is cheap and
    /// the herd is bounded by the TTL. `refresh` is factored out so in-flight
    /// coalescing can be added behind it without changing callers.
    pub async fn get_rate(&self) -> RateQuote {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            if snapshot.fetched_at.elapsed() < self.ttl {
                metrics::record_rate_served("cached");
                return RateQuote {
                    rate: snapshot.rate,
                    origin: RateOrigin::Cached,
                    source: snapshot.source.clone(),
                };
            }
        }

        match self.refresh().await {
            Ok(quote) => quote,
            Err(e) => self.degraded(e).await,
        }
    }

    async fn refresh(&self) -> Result<RateQuote, FeedError> {
        let rate = self.feed.fetch_rate().await?;
        let source = self.feed.source().to_string();

        tracing::debug!(rate = %rate, source = %source, "Fetched fresh exchange rate");
        metrics::record_rate_served("fresh");

        let mut cache = self.cache.write().await;
        *cache = Some(RateSnapshot {
            rate,
            fetched_at: Instant::now(),
            source: source.clone(),
        });

        Ok(RateQuote {
            rate,
            origin: RateOrigin::Fresh,
            source,
        })
    }

    async fn degraded(&self, cause: FeedError) -> RateQuote {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            tracing::warn!(
                error = %cause,
                age_secs = snapshot.fetched_at.elapsed().as_secs(),
                "Price feed unreachable, serving stale cached rate"
            );
            metrics::record_rate_served("stale");
            return RateQuote {
                rate: snapshot.rate,
                origin: RateOrigin::Stale,
                source: snapshot.source.clone(),
            };
        }

        tracing::warn!(
            error = %cause,
            fallback = %self.fallback_rate,
            "Price feed unreachable and no cached rate, serving fallback constant"
        );
        metrics::record_rate_served("fallback");
        RateQuote {
            rate: self.fallback_rate,
            origin: RateOrigin::Fallback,
            source: "fallback".to_string(),
        }
    }

    /// Drop the cached snapshot (manual refresh / tests).
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }
}

/// Convert a local-currency amount to crypto at `rate`, rounded to 8
/// decimal places. Non-positive input converts to zero.
pub fn to_crypto(amount_local: Decimal, rate: Decimal) -> Decimal {
    if amount_local <= Decimal::ZERO || rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount_local / rate).round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a crypto amount to local currency at `rate`, rounded to 2
/// decimal places. Non-positive input converts to zero.
pub fn to_local(amount_crypto: Decimal, rate: Decimal) -> Decimal {
    if amount_crypto <= Decimal::ZERO || rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount_crypto * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
