//! Error Types for Local Pricing

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PricingError>;

#[derive(Error, Debug)]
pub enum PricingError {
    /// Provider answered with something other than 200
    #[error("Exchange rate provider returned HTTP {0}")]
    UpstreamStatus(u16),

    /// Provider body had no usable `rates` object
    #[error("Malformed exchange rate response: {0}")]
    Malformed(String),

    #[error("No {target} rate against base {base}")]
    RateUnavailable { base: String, target: String },

    #[error("GeoIP database error: {0}")]
    GeoIp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Level catalog error: {0}")]
    Catalog(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PricingError {
    /// Message safe to show outside the service
    pub fn user_message(&self) -> &str {
        match self {
            PricingError::UpstreamStatus(_)
            | PricingError::Malformed(_)
            | PricingError::RateUnavailable { .. }
            | PricingError::Network(_) => "Local pricing is temporarily unavailable.",
            PricingError::Config(_) | PricingError::Catalog(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
