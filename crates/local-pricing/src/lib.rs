//! # local-pricing
//!
//! Approximate local-currency pricing for membership checkout, and country
//! gating for regional discount codes.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌────────────────┐   ┌──────────────┐
//! │ visitor IP   │──▶│ GeoIP country  │──▶│ currency table │──▶│ rate (cached │
//! │ (preheader)  │   │ (per session)  │   │                │   │  per base)   │
//! └──────────────┘   └────────────────┘   └────────────────┘   └──────┬───────┘
//!                                                                     ▼
//!                                  "In your local currency, the price is ~GBP 79.00."
//! ```
//!
//! Every failure on the pricing path hides the message. Only a regional
//! discount code redeemed from the wrong country is reported to the visitor.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use local_pricing::{LocalPricingHooks, PricingConfig};
//!
//! let config = PricingConfig::from_env()?;
//! let hooks = LocalPricingHooks::from_config(&config, host, geoip, rates);
//!
//! let mut session = CheckoutSession::new();
//! hooks.checkout_preheader(&mut session, "81.2.69.160").await;
//! let fragment = hooks.local_cost_text(&session, Some(1), None).await;
//! ```

pub mod config;
pub mod currency;
pub mod discount;
pub mod error;
pub mod exchange;
pub mod format;
pub mod geo;
pub mod hooks;
pub mod host;
pub mod localizer;
pub mod model;
pub mod session;

pub use config::PricingConfig;
pub use currency::CurrencyMapper;
pub use discount::{CodeCheck, CountryDiscounts, DiscountCountryMap, RegistrationCheck};
pub use error::{PricingError, Result};
pub use exchange::{ExchangeRateClient, RateSource};
pub use geo::{GeoIpLookup, LocationResolver, LookupFailurePolicy};
pub use hooks::{CostTextContext, LocalPricingHooks};
pub use host::{CheckoutHost, StaticLevelCatalog};
pub use localizer::{LocalPrice, PriceLocalizer, Suppressed};
pub use model::{ExchangeRateSnapshot, LevelPriceTerms};
pub use session::{CheckoutSession, MemorySessionStore, SessionId, SessionStore};
