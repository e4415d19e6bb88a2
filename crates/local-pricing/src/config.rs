//! Configuration
//!
//! Read from environment variables (the server loads `.env` first).

use std::path::PathBuf;

use crate::discount::DiscountCountryMap;
use crate::error::{PricingError, Result};
use crate::exchange::{DEFAULT_RATES_URL, DEFAULT_RATE_TTL_SECS};
use crate::geo::LookupFailurePolicy;

/// Session lifetime when none is configured
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Local pricing settings
#[derive(Clone, Debug)]
pub struct PricingConfig {
    /// Exchange-rate provider credential
    pub app_id: Option<String>,

    /// Merchant's accounting currency
    pub site_currency: String,

    /// Exchange-rate provider endpoint
    pub rates_url: String,

    /// Snapshot lifetime in seconds
    pub rate_ttl_secs: i64,

    /// GeoLite2-Country database
    pub geoip_db: Option<PathBuf>,

    /// Replaces the visitor IP when set
    pub test_ip: Option<String>,

    pub lookup_failure_policy: LookupFailurePolicy,

    pub discounts: DiscountCountryMap,

    /// Country to currency additions
    pub currency_overrides: Vec<(String, String)>,

    /// Level catalog for the built-in host adapter
    pub levels_file: Option<PathBuf>,

    /// Idle checkout sessions are dropped after this many seconds
    pub session_ttl_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            site_currency: "USD".into(),
            rates_url: DEFAULT_RATES_URL.into(),
            rate_ttl_secs: DEFAULT_RATE_TTL_SECS,
            geoip_db: None,
            test_ip: None,
            lookup_failure_policy: LookupFailurePolicy::Retry,
            discounts: DiscountCountryMap::new(),
            currency_overrides: Vec::new(),
            levels_file: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl PricingConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let rate_ttl_secs = match get("LOCAL_PRICING_RATE_TTL_SECS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| PricingError::Config(format!("LOCAL_PRICING_RATE_TTL_SECS must be a positive integer, got '{v}'")))?,
            None => defaults.rate_ttl_secs,
        };

        let session_ttl_secs = match get("LOCAL_PRICING_SESSION_TTL_SECS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| PricingError::Config(format!("LOCAL_PRICING_SESSION_TTL_SECS must be a positive integer, got '{v}'")))?,
            None => defaults.session_ttl_secs,
        };

        let lookup_failure_policy = match get("LOCAL_PRICING_REMEMBER_FAILED_LOOKUPS") {
            Some(v) => {
                if parse_bool(&v)? {
                    LookupFailurePolicy::Remember
                } else {
                    LookupFailurePolicy::Retry
                }
            }
            None => defaults.lookup_failure_policy,
        };

        let discounts = match get("LOCAL_PRICING_DISCOUNTS") {
            Some(v) => DiscountCountryMap::parse(&v)?,
            None => defaults.discounts,
        };

        let currency_overrides = match get("LOCAL_PRICING_CURRENCY_OVERRIDES") {
            Some(v) => parse_pairs("LOCAL_PRICING_CURRENCY_OVERRIDES", &v)?,
            None => Vec::new(),
        };

        Ok(Self {
            app_id: get("LOCAL_PRICING_APP_ID"),
            site_currency: get("LOCAL_PRICING_SITE_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.site_currency),
            rates_url: get("LOCAL_PRICING_RATES_URL").unwrap_or(defaults.rates_url),
            rate_ttl_secs,
            geoip_db: get("LOCAL_PRICING_GEOIP_DB").map(PathBuf::from),
            test_ip: get("LOCAL_PRICING_TEST_IP"),
            lookup_failure_policy,
            discounts,
            currency_overrides,
            levels_file: get("LOCAL_PRICING_LEVELS_FILE").map(PathBuf::from),
            session_ttl_secs,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PricingError::Config(format!("expected a boolean, got '{other}'"))),
    }
}

fn parse_pairs(key: &str, value: &str) -> Result<Vec<(String, String)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            pair.split_once(':')
                .map(|(a, b)| (a.trim().to_uppercase(), b.trim().to_uppercase()))
                .filter(|(a, b)| !a.is_empty() && !b.is_empty())
                .ok_or_else(|| PricingError::Config(format!("{key}: invalid pair '{pair}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<PricingConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PricingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.site_currency, "USD");
        assert_eq!(config.rate_ttl_secs, 3600);
        assert_eq!(config.rates_url, DEFAULT_RATES_URL);
        assert_eq!(config.lookup_failure_policy, LookupFailurePolicy::Retry);
        assert!(config.app_id.is_none());
        assert!(config.discounts.is_empty());
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn test_full_environment() {
        let config = config(&[
            ("LOCAL_PRICING_APP_ID", "abc123"),
            ("LOCAL_PRICING_SITE_CURRENCY", "eur"),
            ("LOCAL_PRICING_RATE_TTL_SECS", "600"),
            ("LOCAL_PRICING_TEST_IP", "41.0.0.1"),
            ("LOCAL_PRICING_REMEMBER_FAILED_LOOKUPS", "yes"),
            ("LOCAL_PRICING_DISCOUNTS", "ZA:LEKKER"),
            ("LOCAL_PRICING_CURRENCY_OVERRIDES", "zw:zwg"),
            ("LOCAL_PRICING_GEOIP_DB", "/data/GeoLite2-Country.mmdb"),
            ("LOCAL_PRICING_SESSION_TTL_SECS", "1800"),
        ])
        .unwrap();

        assert_eq!(config.app_id.as_deref(), Some("abc123"));
        assert_eq!(config.site_currency, "EUR");
        assert_eq!(config.rate_ttl_secs, 600);
        assert_eq!(config.test_ip.as_deref(), Some("41.0.0.1"));
        assert_eq!(config.lookup_failure_policy, LookupFailurePolicy::Remember);
        assert_eq!(config.discounts.code_for(Some("ZA")), Some("LEKKER"));
        assert_eq!(config.currency_overrides, vec![("ZW".to_string(), "ZWG".to_string())]);
        assert!(config.geoip_db.is_some());
        assert_eq!(config.session_ttl_secs, 1800);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[("LOCAL_PRICING_APP_ID", "  "), ("LOCAL_PRICING_TEST_IP", "")]).unwrap();
        assert!(config.app_id.is_none());
        assert!(config.test_ip.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("LOCAL_PRICING_RATE_TTL_SECS", "soon")]), Err(PricingError::Config(_))));
        assert!(matches!(config(&[("LOCAL_PRICING_RATE_TTL_SECS", "0")]), Err(PricingError::Config(_))));
        assert!(matches!(config(&[("LOCAL_PRICING_SESSION_TTL_SECS", "-5")]), Err(PricingError::Config(_))));
        assert!(matches!(config(&[("LOCAL_PRICING_REMEMBER_FAILED_LOOKUPS", "maybe")]), Err(PricingError::Config(_))));
        assert!(matches!(config(&[("LOCAL_PRICING_DISCOUNTS", "ZA")]), Err(PricingError::Config(_))));
        assert!(matches!(config(&[("LOCAL_PRICING_CURRENCY_OVERRIDES", "ZW")]), Err(PricingError::Config(_))));
    }
}
