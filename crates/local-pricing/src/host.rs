//! Membership Host
//!
//! What local pricing needs from the membership system: the site currency and
//! the price terms of the level being checked out.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};
use crate::model::LevelPriceTerms;

/// Membership host trait
pub trait CheckoutHost: Send + Sync {
    /// Merchant's accounting currency
    fn site_currency(&self) -> &str;

    /// Level terms at checkout, with the discount code applied when valid
    fn level_at_checkout(&self, level_id: Option<u32>, discount_code: Option<&str>) -> Option<LevelPriceTerms>;
}

/// Terms a discount code gives one level
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscountedTerms {
    pub level_id: u32,
    pub initial_payment: Decimal,
    #[serde(default)]
    pub billing_amount: Decimal,
    #[serde(default)]
    pub cycle_number: Option<u32>,
    #[serde(default)]
    pub cycle_period: Option<String>,
}

/// Discount code definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscountCodeDef {
    pub code: String,
    #[serde(default)]
    pub levels: Vec<DiscountedTerms>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    levels: Vec<LevelPriceTerms>,
    #[serde(default)]
    discount_codes: Vec<DiscountCodeDef>,
}

/// Fixed level and discount-code catalog
#[derive(Clone, Debug)]
pub struct StaticLevelCatalog {
    site_currency: String,
    levels: HashMap<u32, LevelPriceTerms>,
    codes: HashMap<String, DiscountCodeDef>,
}

impl StaticLevelCatalog {
    pub fn new(site_currency: impl Into<String>) -> Self {
        Self {
            site_currency: site_currency.into().to_uppercase(),
            levels: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    pub fn with_level(mut self, level: LevelPriceTerms) -> Self {
        self.levels.insert(level.id, level);
        self
    }

    pub fn with_discount_code(mut self, def: DiscountCodeDef) -> Self {
        self.codes.insert(def.code.to_uppercase(), def);
        self
    }

    /// Parse `{ "levels": [...], "discount_codes": [...] }`
    pub fn from_json(site_currency: &str, json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::new(site_currency);
        for level in file.levels {
            if level.id == 0 {
                return Err(PricingError::Catalog("level id 0 is reserved".into()));
            }
            catalog = catalog.with_level(level);
        }
        for def in file.discount_codes {
            catalog = catalog.with_discount_code(def);
        }
        Ok(catalog)
    }

    pub fn from_json_file(site_currency: &str, path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(site_currency, &json)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

impl CheckoutHost for StaticLevelCatalog {
    fn site_currency(&self) -> &str {
        &self.site_currency
    }

    fn level_at_checkout(&self, level_id: Option<u32>, discount_code: Option<&str>) -> Option<LevelPriceTerms> {
        let mut level = self.levels.get(&level_id?)?.clone();

        let code = discount_code.map(str::trim).filter(|c| !c.is_empty());
        let Some(code) = code else {
            return Some(level);
        };

        // Codes match case-insensitively; the level keeps the code as submitted
        if let Some(def) = self.codes.get(&code.to_uppercase()) {
            if let Some(terms) = def.levels.iter().find(|t| t.level_id == level.id) {
                level.initial_payment = terms.initial_payment;
                level.billing_amount = terms.billing_amount;
                if let Some(n) = terms.cycle_number {
                    level.cycle_number = n;
                }
                if let Some(period) = &terms.cycle_period {
                    level.cycle_period.clone_from(period);
                }
                level.discount_code = Some(code.to_string());
            }
        }

        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CATALOG: &str = r#"{
        "levels": [
            {"id": 1, "name": "Gold", "initial_payment": 100, "billing_amount": 100, "cycle_number": 1, "cycle_period": "Year"},
            {"id": 2, "name": "Silver", "initial_payment": 25, "billing_amount": 10, "cycle_number": 1, "cycle_period": "Month"}
        ],
        "discount_codes": [
            {"code": "LEKKER", "levels": [{"level_id": 1, "initial_payment": 60, "billing_amount": 60}]}
        ]
    }"#;

    #[test]
    fn test_level_lookup() {
        let catalog = StaticLevelCatalog::from_json("usd", CATALOG).unwrap();
        assert_eq!(catalog.site_currency(), "USD");
        assert_eq!(catalog.level_count(), 2);

        let level = catalog.level_at_checkout(Some(2), None).unwrap();
        assert_eq!(level.initial_payment, dec!(25));
        assert_eq!(level.cycle_period, "Month");

        assert!(catalog.level_at_checkout(Some(9), None).is_none());
        assert!(catalog.level_at_checkout(None, None).is_none());
    }

    #[test]
    fn test_discount_code_applies() {
        let catalog = StaticLevelCatalog::from_json("USD", CATALOG).unwrap();

        let level = catalog.level_at_checkout(Some(1), Some("lekker")).unwrap();
        assert_eq!(level.initial_payment, dec!(60));
        assert_eq!(level.cycle_period, "Year");
        assert_eq!(level.discount_code.as_deref(), Some("lekker"));

        // Code without terms for this level leaves it untouched
        let level = catalog.level_at_checkout(Some(2), Some("LEKKER")).unwrap();
        assert_eq!(level.initial_payment, dec!(25));
        assert_eq!(level.discount_code, None);

        let level = catalog.level_at_checkout(Some(1), Some("BOGUS")).unwrap();
        assert_eq!(level.discount_code, None);
    }

    #[test]
    fn test_level_zero_rejected() {
        let json = r#"{"levels": [{"id": 0, "initial_payment": 1}]}"#;
        assert!(matches!(
            StaticLevelCatalog::from_json("USD", json),
            Err(PricingError::Catalog(_))
        ));
    }
}
