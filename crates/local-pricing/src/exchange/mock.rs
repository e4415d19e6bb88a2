//! Mock Rate Source
//!
//! For testing and demo purposes. Serves static rates and counts requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::RateSource;
use crate::error::{PricingError, Result};

#[derive(Default)]
pub struct MockRateSource {
    rates: HashMap<String, HashMap<String, Decimal>>,
    fail_status: Option<u16>,
    calls: AtomicUsize,
}

impl MockRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, base: &str, target: &str, rate: Decimal) -> Self {
        self.rates
            .entry(base.to_uppercase())
            .or_default()
            .insert(target.to_uppercase(), rate);
        self
    }

    /// Every request fails as if the provider returned `status`
    pub fn failing_with(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn latest(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.fail_status {
            return Err(PricingError::UpstreamStatus(status));
        }

        Ok(self.rates.get(&base.to_uppercase()).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "MockRates"
    }
}
