//! Regional Discount Codes
//!
//! Some discount codes may only be redeemed from one country. The map holds
//! one code per country; any code that appears in it is restricted.
//!
//! Two checks run against the map:
//!
//! - [`check_discount_code`] when a code is entered. The entered code is
//!   uppercased before comparison.
//! - [`registration_checks`] when the checkout is submitted. Any case variant
//!   of a restricted code counts as restricted, but only the exact stored
//!   spelling of the visitor's own code is accepted.
//!
//! A lowercase `lekker` therefore passes the first check for a `ZA` visitor
//! mapped to `LEKKER` and fails the second. Restricted-code membership is
//! case-insensitive at registration so that lowercase spelling cannot bypass
//! the country check there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PricingError, Result};

/// Rejection shown when a restricted code is used from the wrong country
pub const NOT_ELIGIBLE_MESSAGE: &str = "Sorry, you do not qualify to redeem this discount code.";

/// Country code to regional discount code
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCountryMap(BTreeMap<String, String>);

impl DiscountCountryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping; the country is uppercased, the code kept verbatim
    pub fn with(mut self, country: &str, code: impl Into<String>) -> Self {
        self.insert(country, code);
        self
    }

    pub fn insert(&mut self, country: &str, code: impl Into<String>) {
        self.0.insert(country.trim().to_uppercase(), code.into());
    }

    /// Parse `CC:CODE,CC:CODE`
    pub fn parse(value: &str) -> Result<Self> {
        let mut map = Self::new();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (country, code) = pair
                .split_once(':')
                .map(|(c, d)| (c.trim(), d.trim()))
                .filter(|(c, d)| !c.is_empty() && !d.is_empty())
                .ok_or_else(|| PricingError::Config(format!("invalid discount mapping '{pair}'")))?;
            map.insert(country, code);
        }
        Ok(map)
    }

    /// Code reserved for a country
    pub fn code_for(&self, country: Option<&str>) -> Option<&str> {
        country
            .and_then(|c| self.0.get(c))
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }

    /// Whether a code is tied to some country (exact match)
    pub fn is_restricted(&self, code: &str) -> bool {
        self.0.values().any(|c| c == code)
    }

    /// Whether any spelling of a code is tied to some country
    pub fn is_restricted_ignore_case(&self, code: &str) -> bool {
        self.0.values().any(|c| c.eq_ignore_ascii_case(code))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Source of the regional discount map, consulted on every check
pub trait CountryDiscounts: Send + Sync {
    fn discounted_countries(&self) -> DiscountCountryMap;
}

impl CountryDiscounts for DiscountCountryMap {
    fn discounted_countries(&self) -> DiscountCountryMap {
        self.clone()
    }
}

/// Discount-code check verdict: `true`, `false`, or a rejection message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeCheck {
    Flag(bool),
    Message(String),
}

impl CodeCheck {
    pub fn okay() -> Self {
        CodeCheck::Flag(true)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        CodeCheck::Message(message.into())
    }

    pub fn is_okay(&self) -> bool {
        matches!(self, CodeCheck::Flag(true))
    }
}

/// Severity attached to a checkout notice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    #[serde(rename = "pmpro_error")]
    Error,
}

/// Message the host should display on the checkout page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }
}

/// Outcome of the registration check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCheck {
    pub okay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl RegistrationCheck {
    pub fn passed(okay: bool) -> Self {
        Self { okay, notice: None }
    }
}

/// Check an entered discount code against the visitor's country
pub fn check_discount_code(
    okay: CodeCheck,
    entered: &str,
    country: Option<&str>,
    discounts: &DiscountCountryMap,
) -> CodeCheck {
    if !okay.is_okay() {
        return okay;
    }

    let code = entered.to_uppercase();
    if !discounts.is_restricted(&code) {
        return okay;
    }

    match discounts.code_for(country) {
        Some(allowed) if allowed == code => CodeCheck::okay(),
        _ => {
            debug!("Regional code {} rejected for country {:?}", code, country);
            CodeCheck::rejected(NOT_ELIGIBLE_MESSAGE)
        }
    }
}

/// Check the checkout level's discount code at registration
pub fn registration_checks(
    okay: bool,
    submitted: Option<&str>,
    country: Option<&str>,
    discounts: &DiscountCountryMap,
) -> RegistrationCheck {
    if !okay {
        return RegistrationCheck::passed(false);
    }

    let Some(code) = submitted.filter(|c| !c.is_empty()) else {
        return RegistrationCheck::passed(true);
    };

    if !discounts.is_restricted_ignore_case(code) {
        return RegistrationCheck::passed(true);
    }

    match discounts.code_for(country) {
        Some(allowed) if allowed == code => RegistrationCheck::passed(true),
        _ => {
            debug!("Regional code {} blocked at registration for country {:?}", code, country);
            RegistrationCheck {
                okay: false,
                notice: Some(Notice::error(NOT_ELIGIBLE_MESSAGE)),
            }
        }
    }
}
