//! Open Exchange Rates client
//!
//! `GET latest.json?app_id=..&base=..` returning `{ "rates": { "GBP": 0.79, .. } }`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::RateSource;
use crate::error::{PricingError, Result};

pub const DEFAULT_RATES_URL: &str = "https://openexchangerates.org/api/latest.json";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: Option<HashMap<String, f64>>,
}

/// HTTP rate source
pub struct OpenExchangeRates {
    client: Client,
    endpoint: String,
    app_id: String,
}

impl OpenExchangeRates {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_RATES_URL, app_id)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            app_id: app_id.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Decode a provider body into decimal rates
    pub fn parse_rates(body: &str) -> Result<HashMap<String, Decimal>> {
        let response: LatestResponse =
            serde_json::from_str(body).map_err(|e| PricingError::Malformed(e.to_string()))?;

        let rates = response
            .rates
            .ok_or_else(|| PricingError::Malformed("missing rates".into()))?;

        Ok(rates
            .into_iter()
            .filter_map(|(currency, rate)| {
                Decimal::from_f64(rate).map(|rate| (currency.to_uppercase(), rate))
            })
            .collect())
    }
}

#[async_trait]
impl RateSource for OpenExchangeRates {
    async fn latest(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        debug!("Fetching {} rates from {}", base, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("app_id", self.app_id.as_str()), ("base", base)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PricingError::UpstreamStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Self::parse_rates(&body)
    }

    fn name(&self) -> &str {
        "OpenExchangeRates"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_rates() {
        let body = r#"{
            "disclaimer": "Usage subject to terms",
            "timestamp": 1700000000,
            "base": "USD",
            "rates": { "GBP": 0.79, "ZAR": 18.2, "JPY": 150 }
        }"#;

        let rates = OpenExchangeRates::parse_rates(body).unwrap();
        assert_eq!(rates.get("GBP"), Some(&dec!(0.79)));
        assert_eq!(rates.get("ZAR"), Some(&dec!(18.2)));
        assert_eq!(rates.get("JPY"), Some(&dec!(150)));
    }

    #[test]
    fn test_missing_rates_is_malformed() {
        let body = r#"{"error": true, "status": 401, "message": "invalid_app_id"}"#;
        assert!(matches!(
            OpenExchangeRates::parse_rates(body),
            Err(PricingError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_json_is_malformed() {
        assert!(matches!(
            OpenExchangeRates::parse_rates("<html>"),
            Err(PricingError::Malformed(_))
        ));
    }
}
