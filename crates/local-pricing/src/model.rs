//! Domain Models
//!
//! Price terms read from the membership host and the rate snapshots fetched
//! from the exchange-rate provider. All money and rates are `Decimal`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Price terms of a membership level at checkout, possibly after a discount code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPriceTerms {
    /// Host level id
    pub id: u32,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Amount charged at checkout
    pub initial_payment: Decimal,

    /// Recurring amount (zero for one-time levels)
    #[serde(default)]
    pub billing_amount: Decimal,

    /// Number of periods per billing cycle
    #[serde(default)]
    pub cycle_number: u32,

    /// Billing period label, e.g. "Month"
    #[serde(default)]
    pub cycle_period: String,

    /// Discount code applied to these terms, if any
    #[serde(default)]
    pub discount_code: Option<String>,
}

impl LevelPriceTerms {
    pub fn new(id: u32, initial_payment: Decimal, billing_amount: Decimal) -> Self {
        Self {
            id,
            name: String::new(),
            initial_payment,
            billing_amount,
            cycle_number: 0,
            cycle_period: String::new(),
            discount_code: None,
        }
    }

    pub fn with_cycle(mut self, cycle_number: u32, cycle_period: impl Into<String>) -> Self {
        self.cycle_number = cycle_number;
        self.cycle_period = cycle_period.into();
        self
    }

    /// Nothing is charged now or later
    pub fn is_free(&self) -> bool {
        self.initial_payment <= Decimal::ZERO && self.billing_amount <= Decimal::ZERO
    }

    /// One-time or flat recurring price
    pub fn is_flat(&self) -> bool {
        self.initial_payment == self.billing_amount
    }
}

/// Every rate the provider returned for one base currency
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    /// Base currency (e.g. "USD")
    pub base: String,

    /// Units of each currency per one unit of `base`
    pub rates: HashMap<String, Decimal>,

    /// When the provider was queried
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRateSnapshot {
    pub fn new(base: impl Into<String>, rates: HashMap<String, Decimal>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            rates,
            fetched_at: Utc::now(),
        }
    }

    /// Backdate the snapshot
    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = at;
        self
    }

    /// Still inside its time-to-live at `now`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < ttl
    }

    pub fn rate(&self, target: &str) -> Option<Decimal> {
        self.rates.get(target).copied()
    }
}
