//! Checkout Hooks
//!
//! The callbacks the membership host invokes during checkout, bundled over
//! one resolver, localizer and discount map.
//!
//! ```text
//! checkout_preheader ──▶ LocationResolver ──▶ session country
//! level_cost_text / local_cost_text ──▶ PriceLocalizer ──▶ message
//! check_discount_code / registration_checks ──▶ discount gate
//! after_checkout ──▶ session country cleared
//! ```

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::currency::CurrencyMapper;
use crate::discount::{self, CodeCheck, CountryDiscounts, RegistrationCheck};
use crate::exchange::{ExchangeRateClient, RateSource};
use crate::geo::{GeoIpLookup, LocationResolver};
use crate::host::CheckoutHost;
use crate::localizer::PriceLocalizer;
use crate::model::LevelPriceTerms;
use crate::session::CheckoutSession;

/// AJAX action serving the localized price fragment
pub const AJAX_ACTION: &str = "pmpro_local_get_local_cost_text";

/// Host AJAX action that re-renders the level cost after a code is applied
pub const APPLY_DISCOUNT_ACTION: &str = "applydiscountcode";

pub const SCRIPT_HANDLE: &str = "pmpro-local-pricing";

pub const PLUGIN_NAME: &str = "Paid Memberships Pro - Local Pricing Add On";

const PLUGIN_FILE: &str = "pmpro-local-pricing.php";
const DOCS_URL: &str = "https://www.paidmembershipspro.com/add-ons/local-pricing/";
const SUPPORT_URL: &str = "https://www.paidmembershipspro.com/support/";

/// Request details the cost-text filter depends on
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CostTextContext {
    #[serde(default)]
    pub is_checkout_page: bool,

    /// Current AJAX action, if any
    #[serde(default)]
    pub action: Option<String>,

    /// Code submitted with the action
    #[serde(default)]
    pub code: Option<String>,
}

impl CostTextContext {
    fn is_applying_discount(&self) -> bool {
        self.action.as_deref() == Some(APPLY_DISCOUNT_ACTION)
    }
}

/// Checkout script to enqueue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAsset {
    pub handle: String,
    pub src: String,
    pub deps: Vec<String>,
    pub version: String,
    pub in_footer: bool,
    /// Global object name the localized values are exposed under
    pub object_name: String,
    pub ajaxurl: String,
}

/// Privacy policy section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyContent {
    pub plugin_name: String,
    pub content: String,
}

pub struct LocalPricingHooks {
    resolver: LocationResolver,
    localizer: PriceLocalizer,
    discounts: Arc<dyn CountryDiscounts>,
}

impl LocalPricingHooks {
    pub fn new(
        resolver: LocationResolver,
        localizer: PriceLocalizer,
        discounts: Arc<dyn CountryDiscounts>,
    ) -> Self {
        Self {
            resolver,
            localizer,
            discounts,
        }
    }

    /// Wire every component from configuration
    pub fn from_config(
        config: &PricingConfig,
        host: Arc<dyn CheckoutHost>,
        geoip: Arc<dyn GeoIpLookup>,
        rate_source: Arc<dyn RateSource>,
    ) -> Self {
        let resolver = LocationResolver::new(geoip)
            .with_policy(config.lookup_failure_policy)
            .with_test_ip(config.test_ip.clone());

        let rates = Arc::new(
            ExchangeRateClient::new(rate_source).with_ttl(Duration::seconds(config.rate_ttl_secs)),
        );

        let currencies = CurrencyMapper::new().with_overrides(config.currency_overrides.iter().cloned());
        let discounts: Arc<dyn CountryDiscounts> = Arc::new(config.discounts.clone());

        let localizer = PriceLocalizer::new(host, rates, currencies, discounts.clone());

        Self::new(resolver, localizer, discounts)
    }

    pub fn geoip_provider(&self) -> &'static str {
        self.resolver.provider_name()
    }

    pub fn localizer(&self) -> &PriceLocalizer {
        &self.localizer
    }

    pub fn host(&self) -> &Arc<dyn CheckoutHost> {
        self.localizer.host()
    }

    /// Before the checkout level is loaded
    pub async fn checkout_preheader(&self, session: &mut CheckoutSession, ip: &str) -> Option<String> {
        self.resolver.resolve_country(session, ip).await
    }

    /// Level cost text filter
    pub async fn level_cost_text(
        &self,
        session: &CheckoutSession,
        cost: &str,
        level: &LevelPriceTerms,
        ctx: &CostTextContext,
    ) -> String {
        if level.is_free() {
            return cost.to_string();
        }

        if !ctx.is_checkout_page && !ctx.is_applying_discount() {
            return cost.to_string();
        }

        let mut html = String::from(cost);
        html.push_str(r#"<div id="pmpro-local-price">"#);

        if ctx.is_applying_discount() {
            html.push_str(r#"<div class="pmpro-local-price_inner">"#);
            if let Some(message) = self
                .localizer
                .localized_price_message(session, level.id, ctx.code.as_deref())
                .await
            {
                html.push_str(&message);
            }
            html.push_str("</div>");
        }

        html.push_str("</div>");
        html
    }

    /// Discount code check when a code is entered
    pub fn check_discount_code(&self, okay: CodeCheck, session: &CheckoutSession, entered: &str) -> CodeCheck {
        discount::check_discount_code(
            okay,
            entered,
            session.country(),
            &self.discounts.discounted_countries(),
        )
    }

    /// Registration check on checkout submit
    pub fn registration_checks(
        &self,
        okay: bool,
        session: &CheckoutSession,
        checkout_level: Option<&LevelPriceTerms>,
    ) -> RegistrationCheck {
        discount::registration_checks(
            okay,
            checkout_level.and_then(|l| l.discount_code.as_deref()),
            session.country(),
            &self.discounts.discounted_countries(),
        )
    }

    /// After a completed checkout
    pub fn after_checkout(&self, session: &mut CheckoutSession) {
        session.clear_location();
    }

    /// AJAX fragment for the checkout level; empty when nothing applies
    pub async fn local_cost_text(
        &self,
        session: &CheckoutSession,
        level_id: Option<u32>,
        discount_code: Option<&str>,
    ) -> String {
        let Some(level) = self
            .localizer
            .host()
            .level_at_checkout(level_id, discount_code)
            .filter(|l| l.id != 0)
        else {
            return String::new();
        };

        self.localizer
            .localized_price_message(session, level.id, level.discount_code.as_deref())
            .await
            .unwrap_or_default()
    }

    /// Checkout script, only on the checkout page
    pub fn enqueue_scripts(&self, is_checkout_page: bool, ajax_url: &str) -> Option<ScriptAsset> {
        if !is_checkout_page {
            return None;
        }

        Some(ScriptAsset {
            handle: SCRIPT_HANDLE.into(),
            src: "js/pmpro-local-pricing.js".into(),
            deps: vec!["jquery".into()],
            version: env!("CARGO_PKG_VERSION").into(),
            in_footer: true,
            object_name: "pmpro_local".into(),
            ajaxurl: ajax_url.into(),
        })
    }

    pub fn privacy_policy_content() -> PolicyContent {
        let content = concat!(
            "<h2>Data collected to show localized pricing at checkout.</h2>",
            "<p>At checkout, we will use your IP address to find your general location to show a ",
            "localized rate in your local currency for your convenience. This information is stored ",
            "temporarily during checkout and clears after checkout is completed.</p>"
        );

        PolicyContent {
            plugin_name: PLUGIN_NAME.into(),
            content: content.into(),
        }
    }

    /// Docs and Support links for the add-on's row in the plugin list
    pub fn plugin_row_meta(mut links: Vec<String>, file: &str) -> Vec<String> {
        if file.contains(PLUGIN_FILE) {
            links.push(format!(
                r#"<a href="{DOCS_URL}" title="View Documentation">Docs</a>"#
            ));
            links.push(format!(
                r#"<a href="{SUPPORT_URL}" title="Visit Customer Support Forum">Support</a>"#
            ));
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::{DiscountCountryMap, NOT_ELIGIBLE_MESSAGE};
    use crate::exchange::MockRateSource;
    use crate::geo::MockGeoIp;
    use crate::host::{DiscountCodeDef, DiscountedTerms, StaticLevelCatalog};
    use rust_decimal_macros::dec;

    fn hooks(geoip: Arc<MockGeoIp>, rates: Arc<MockRateSource>) -> LocalPricingHooks {
        let config = PricingConfig {
            discounts: DiscountCountryMap::new().with("ZA", "LEKKER"),
            ..PricingConfig::default()
        };

        let catalog = StaticLevelCatalog::new("USD")
            .with_level(LevelPriceTerms::new(1, dec!(100), dec!(100)).with_cycle(1, "Year"))
            .with_level(LevelPriceTerms::new(2, dec!(0), dec!(0)))
            .with_discount_code(DiscountCodeDef {
                code: "LEKKER".into(),
                levels: vec![DiscountedTerms {
                    level_id: 1,
                    initial_payment: dec!(50),
                    billing_amount: dec!(50),
                    cycle_number: None,
                    cycle_period: None,
                }],
            });

        LocalPricingHooks::from_config(&config, Arc::new(catalog), geoip, rates)
    }

    fn fixtures() -> (Arc<MockGeoIp>, Arc<MockRateSource>) {
        let geoip = Arc::new(
            MockGeoIp::new()
                .with_entry("81.2.69.160", "GB")
                .with_entry("41.0.0.1", "ZA"),
        );
        let rates = Arc::new(
            MockRateSource::new()
                .with_rate("USD", "GBP", dec!(0.79))
                .with_rate("USD", "ZAR", dec!(18)),
        );
        (geoip, rates)
    }

    #[tokio::test]
    async fn test_checkout_flow() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip.clone(), rates.clone());
        let mut session = CheckoutSession::new();

        assert_eq!(hooks.checkout_preheader(&mut session, "81.2.69.160").await.as_deref(), Some("GB"));

        let html = hooks.local_cost_text(&session, Some(1), None).await;
        assert!(html.contains("~GBP 79.00"));

        hooks.after_checkout(&mut session);
        assert_eq!(session.country(), None);
        assert_eq!(hooks.local_cost_text(&session, Some(1), None).await, "");

        hooks.checkout_preheader(&mut session, "81.2.69.160").await;
        assert_eq!(geoip.lookups(), 2);
        assert_eq!(rates.calls(), 1);
    }

    #[tokio::test]
    async fn test_local_cost_text_unknown_level_is_empty() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);
        let mut session = CheckoutSession::new();
        session.set_country("GB");

        assert_eq!(hooks.local_cost_text(&session, None, None).await, "");
        assert_eq!(hooks.local_cost_text(&session, Some(7), None).await, "");
    }

    #[tokio::test]
    async fn test_local_cost_text_uses_level_discount_code() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);
        let mut session = CheckoutSession::new();
        session.set_country("ZA");

        let html = hooks.local_cost_text(&session, Some(1), Some("LEKKER")).await;
        assert!(html.contains("~ZAR 900.00"));
        assert!(!html.contains("pmpro-local-discount-nudge"));

        let html = hooks.local_cost_text(&session, Some(1), None).await;
        assert!(html.contains("~ZAR 1800.00"));
        assert!(html.contains("pmpro-local-discount-nudge"));
    }

    #[tokio::test]
    async fn test_level_cost_text_placeholder() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates.clone());
        let mut session = CheckoutSession::new();
        session.set_country("GB");
        let level = LevelPriceTerms::new(1, dec!(100), dec!(100));

        let ctx = CostTextContext {
            is_checkout_page: true,
            ..Default::default()
        };
        let html = hooks.level_cost_text(&session, "$100 per Year.", &level, &ctx).await;
        assert_eq!(html, r#"$100 per Year.<div id="pmpro-local-price"></div>"#);
        assert_eq!(rates.calls(), 0);
    }

    #[tokio::test]
    async fn test_level_cost_text_off_checkout_and_free() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);
        let session = CheckoutSession::new();

        let paid = LevelPriceTerms::new(1, dec!(100), dec!(100));
        let html = hooks.level_cost_text(&session, "cost", &paid, &CostTextContext::default()).await;
        assert_eq!(html, "cost");

        let free = LevelPriceTerms::new(2, dec!(0), dec!(0));
        let ctx = CostTextContext {
            is_checkout_page: true,
            ..Default::default()
        };
        assert_eq!(hooks.level_cost_text(&session, "Free", &free, &ctx).await, "Free");
    }

    #[tokio::test]
    async fn test_level_cost_text_during_apply_discount() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);
        let mut session = CheckoutSession::new();
        session.set_country("ZA");
        let level = LevelPriceTerms::new(1, dec!(50), dec!(50));

        let ctx = CostTextContext {
            is_checkout_page: false,
            action: Some(APPLY_DISCOUNT_ACTION.into()),
            code: Some("LEKKER".into()),
        };
        let html = hooks.level_cost_text(&session, "cost", &level, &ctx).await;

        assert!(html.starts_with(r#"cost<div id="pmpro-local-price"><div class="pmpro-local-price_inner"><p id="pmpro-local-exchange-rate">"#));
        assert!(html.contains("~ZAR 900.00"));
        assert!(html.ends_with("</div></div>"));
    }

    #[test]
    fn test_discount_hooks_use_session_country() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);
        let mut session = CheckoutSession::new();
        session.set_country("GB");

        let result = hooks.check_discount_code(CodeCheck::okay(), &session, "lekker");
        assert_eq!(result, CodeCheck::rejected(NOT_ELIGIBLE_MESSAGE));

        let level = LevelPriceTerms {
            discount_code: Some("LEKKER".into()),
            ..LevelPriceTerms::new(1, dec!(50), dec!(50))
        };
        let result = hooks.registration_checks(true, &session, Some(&level));
        assert!(!result.okay);

        assert!(hooks.registration_checks(true, &session, None).okay);
    }

    #[test]
    fn test_enqueue_only_on_checkout() {
        let (geoip, rates) = fixtures();
        let hooks = hooks(geoip, rates);

        assert!(hooks.enqueue_scripts(false, "/ajax").is_none());

        let script = hooks.enqueue_scripts(true, "/ajax").unwrap();
        assert_eq!(script.handle, SCRIPT_HANDLE);
        assert_eq!(script.deps, vec!["jquery".to_string()]);
        assert_eq!(script.ajaxurl, "/ajax");
        assert!(script.in_footer);
    }

    #[test]
    fn test_privacy_and_row_meta() {
        let policy = LocalPricingHooks::privacy_policy_content();
        assert_eq!(policy.plugin_name, PLUGIN_NAME);
        assert!(policy.content.contains("clears after checkout is completed"));

        let links = LocalPricingHooks::plugin_row_meta(vec!["Deactivate".into()], "pmpro-local-pricing/pmpro-local-pricing.php");
        assert_eq!(links.len(), 3);
        assert!(links[1].contains("Docs"));

        let links = LocalPricingHooks::plugin_row_meta(vec![], "other/other.php");
        assert!(links.is_empty());
    }
}
