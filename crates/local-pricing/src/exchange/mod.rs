//! Exchange Rates
//!
//! A rate source fetches every rate for one base currency; the client keeps
//! the last snapshot per base for a fixed time-to-live.
//!
//! ```text
//! rate_for(USD, GBP)
//!   ├─ fresh USD snapshot with GBP ──▶ cached rate
//!   └─ otherwise ──▶ RateSource::latest(USD) ──▶ store snapshot ──▶ rate / RateUnavailable
//! ```
//!
//! Concurrent misses for the same base may each query the source; the last
//! write wins.

mod mock;
mod openexchangerates;

pub use mock::MockRateSource;
pub use openexchangerates::{OpenExchangeRates, DEFAULT_RATES_URL};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{PricingError, Result};
use crate::model::ExchangeRateSnapshot;

/// Snapshot lifetime when none is configured
pub const DEFAULT_RATE_TTL_SECS: i64 = 60 * 60;

/// Exchange rate source trait (Strategy pattern)
#[async_trait]
pub trait RateSource: Send + Sync {
    /// All rates against `base`
    async fn latest(&self, base: &str) -> Result<HashMap<String, Decimal>>;

    /// Source name for logs
    fn name(&self) -> &str;
}

/// Cached rate lookups over a [`RateSource`]
pub struct ExchangeRateClient {
    source: Arc<dyn RateSource>,
    cache: RwLock<HashMap<String, ExchangeRateSnapshot>>,
    ttl: Duration,
}

impl ExchangeRateClient {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(DEFAULT_RATE_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Units of `target` per one unit of `base`
    pub async fn rate_for(&self, base: &str, target: &str) -> Result<Decimal> {
        let base = base.to_uppercase();
        let target = target.to_uppercase();

        if let Some(rate) = self.cached_rate(&base, &target).await {
            debug!("Rate {}->{} served from cache", base, target);
            return Ok(rate);
        }

        let rates = self.source.latest(&base).await.map_err(|e| {
            warn!("{} rate fetch for base {} failed: {}", self.source.name(), base, e);
            e
        })?;

        let snapshot = ExchangeRateSnapshot::new(base.clone(), rates);
        let rate = snapshot.rate(&target);
        self.insert_snapshot(snapshot).await;

        rate.ok_or(PricingError::RateUnavailable { base, target })
    }

    /// Store a snapshot, replacing any previous one for its base
    pub async fn insert_snapshot(&self, snapshot: ExchangeRateSnapshot) {
        let mut cache = self.cache.write().await;
        cache.insert(snapshot.base.clone(), snapshot);
    }

    /// Current snapshot for `base`, fresh or not
    pub async fn snapshot(&self, base: &str) -> Option<ExchangeRateSnapshot> {
        let cache = self.cache.read().await;
        cache.get(&base.to_uppercase()).cloned()
    }

    async fn cached_rate(&self, base: &str, target: &str) -> Option<Decimal> {
        let cache = self.cache.read().await;
        cache
            .get(base)
            .filter(|snapshot| snapshot.is_fresh(self.ttl, Utc::now()))
            .and_then(|snapshot| snapshot.rate(target))
    }
}
