//! Price Localizer
//!
//! Converts a level's price into the visitor's currency and renders the
//! advisory message shown under the level cost at checkout. Every failure is a
//! [`Suppressed`] reason and hides the message.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::currency::CurrencyMapper;
use crate::discount::CountryDiscounts;
use crate::error::PricingError;
use crate::exchange::ExchangeRateClient;
use crate::format::{escape_html, round_price_as_string};
use crate::host::CheckoutHost;
use crate::session::CheckoutSession;

/// Rates below this are treated as bad data
pub const MIN_PLAUSIBLE_RATE: Decimal = dec!(0.1);

/// Converted initial payments below one unit are not shown
pub const MIN_LOCAL_AMOUNT: Decimal = Decimal::ONE;

pub const CONVERSION_HINT: &str = "Your actual price will be converted at checkout based on current exchange rates.";

/// Why no localized price is shown
#[derive(Error, Debug)]
pub enum Suppressed {
    #[error("level {0} is not available at checkout")]
    UnknownLevel(u32),

    #[error("visitor country is unknown")]
    NoCountry,

    #[error("no currency mapped for country {0}")]
    UnmappedCountry(String),

    #[error("visitor currency {0} is the site currency")]
    SameCurrency(String),

    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(#[from] PricingError),

    #[error("implausible exchange rate {0}")]
    ImplausibleRate(Decimal),

    #[error("converted amount {0} is below one unit")]
    AmountTooSmall(Decimal),
}

/// A level price converted to the visitor's currency
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalPrice {
    pub country: String,
    pub currency: String,
    pub rate: Decimal,
    pub initial: Decimal,
    pub billing: Decimal,
    pub cycle_period: String,
    /// Initial and recurring amounts are the same
    pub flat: bool,
    /// Regional code to suggest, when none was entered
    pub nudge_code: Option<String>,
}

impl LocalPrice {
    pub fn initial_display(&self) -> String {
        format!("{} {}", self.currency, round_price_as_string(self.initial, &self.currency))
    }

    pub fn billing_display(&self) -> String {
        format!("{} {}", self.currency, round_price_as_string(self.billing, &self.currency))
    }

    /// Message markup
    pub fn render(&self) -> String {
        let mut html = String::from(r#"<p id="pmpro-local-exchange-rate">"#);

        if self.flat {
            html.push_str(&format!(
                "In your local currency, the price is <strong>~{}</strong>.",
                escape_html(&self.initial_display())
            ));
        } else {
            html.push_str(&format!(
                "In your local currency, the price is <strong>~{}</strong> now and then <strong>~{} per {}</strong>.",
                escape_html(&self.initial_display()),
                escape_html(&self.billing_display()),
                escape_html(&self.cycle_period)
            ));
        }
        html.push_str("</p>");

        html.push_str(&format!(
            r#"<p id="pmpro-local-exchange-rate-hint">{CONVERSION_HINT}</p>"#
        ));

        if let Some(code) = &self.nudge_code {
            html.push_str(&format!(
                r#"<p id="pmpro-local-discount-nudge">Use the discount code <strong>{}</strong> to receive a discounted regional price.</p>"#,
                escape_html(code)
            ));
        }

        html
    }
}

/// Builds localized prices for checkout sessions
pub struct PriceLocalizer {
    host: Arc<dyn CheckoutHost>,
    rates: Arc<ExchangeRateClient>,
    currencies: CurrencyMapper,
    discounts: Arc<dyn CountryDiscounts>,
}

impl PriceLocalizer {
    pub fn new(
        host: Arc<dyn CheckoutHost>,
        rates: Arc<ExchangeRateClient>,
        currencies: CurrencyMapper,
        discounts: Arc<dyn CountryDiscounts>,
    ) -> Self {
        Self {
            host,
            rates,
            currencies,
            discounts,
        }
    }

    pub fn host(&self) -> &Arc<dyn CheckoutHost> {
        &self.host
    }

    /// Visitor's country and currency, when it differs from the site's
    pub fn visitor_currency(&self, session: &CheckoutSession) -> Result<(String, String), Suppressed> {
        let country = session.country().ok_or(Suppressed::NoCountry)?;
        let currency = self
            .currencies
            .currency_for_country(country)
            .ok_or_else(|| Suppressed::UnmappedCountry(country.to_string()))?;

        if currency.eq_ignore_ascii_case(self.host.site_currency()) {
            return Err(Suppressed::SameCurrency(currency.to_string()));
        }

        Ok((country.to_string(), currency.to_string()))
    }

    pub async fn localize(
        &self,
        session: &CheckoutSession,
        level_id: u32,
        discount_code: Option<&str>,
    ) -> Result<LocalPrice, Suppressed> {
        let discount_code = discount_code.map(str::trim).filter(|c| !c.is_empty());

        let level = self
            .host
            .level_at_checkout(Some(level_id), discount_code)
            .ok_or(Suppressed::UnknownLevel(level_id))?;

        let (country, currency) = self.visitor_currency(session)?;

        let rate = self.rates.rate_for(self.host.site_currency(), &currency).await?;
        if rate < MIN_PLAUSIBLE_RATE {
            return Err(Suppressed::ImplausibleRate(rate));
        }

        let initial = level.initial_payment * rate;
        let billing = level.billing_amount * rate;
        if initial < MIN_LOCAL_AMOUNT {
            return Err(Suppressed::AmountTooSmall(initial));
        }

        let nudge_code = if discount_code.is_none() {
            self.discounts
                .discounted_countries()
                .code_for(Some(&country))
                .map(String::from)
        } else {
            None
        };

        Ok(LocalPrice {
            country,
            currency,
            rate,
            initial,
            billing,
            cycle_period: level.cycle_period.clone(),
            flat: level.is_flat(),
            nudge_code,
        })
    }

    /// Rendered message, or `None` when it should stay hidden
    pub async fn localized_price_message(
        &self,
        session: &CheckoutSession,
        level_id: u32,
        discount_code: Option<&str>,
    ) -> Option<String> {
        match self.localize(session, level_id, discount_code).await {
            Ok(price) => Some(price.render()),
            Err(reason) => {
                debug!("Local price hidden for level {}: {}", level_id, reason);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountCountryMap;
    use crate::exchange::MockRateSource;
    use crate::host::{DiscountCodeDef, DiscountedTerms, StaticLevelCatalog};
    use crate::model::LevelPriceTerms;

    fn catalog() -> StaticLevelCatalog {
        StaticLevelCatalog::new("USD")
            .with_level(LevelPriceTerms::new(1, dec!(100), dec!(100)).with_cycle(1, "Year"))
            .with_level(LevelPriceTerms::new(2, dec!(25), dec!(10)).with_cycle(1, "Month"))
            .with_level(LevelPriceTerms::new(3, dec!(0.5), dec!(0.5)))
            .with_discount_code(DiscountCodeDef {
                code: "LEKKER".into(),
                levels: vec![DiscountedTerms {
                    level_id: 1,
                    initial_payment: dec!(60),
                    billing_amount: dec!(60),
                    cycle_number: None,
                    cycle_period: None,
                }],
            })
    }

    fn localizer(source: MockRateSource) -> (PriceLocalizer, Arc<MockRateSource>) {
        let source = Arc::new(source);
        let rates = Arc::new(ExchangeRateClient::new(source.clone()));
        let discounts = DiscountCountryMap::new().with("ZA", "LEKKER");
        let localizer = PriceLocalizer::new(
            Arc::new(catalog()),
            rates,
            CurrencyMapper::new(),
            Arc::new(discounts),
        );
        (localizer, source)
    }

    fn rates() -> MockRateSource {
        MockRateSource::new()
            .with_rate("USD", "GBP", dec!(0.79))
            .with_rate("USD", "ZAR", dec!(18.2))
            .with_rate("USD", "JPY", dec!(149.995))
            .with_rate("USD", "KWD", dec!(0.05))
    }

    fn session_in(country: &str) -> CheckoutSession {
        let mut session = CheckoutSession::new();
        session.set_country(country);
        session
    }

    #[tokio::test]
    async fn test_flat_price_in_gbp() {
        let (localizer, _) = localizer(rates());
        let message = localizer
            .localized_price_message(&session_in("GB"), 1, None)
            .await
            .unwrap();

        assert!(message.contains("In your local currency, the price is <strong>~GBP 79.00</strong>."));
        assert!(message.contains(CONVERSION_HINT));
        assert!(!message.contains("pmpro-local-discount-nudge"));
    }

    #[tokio::test]
    async fn test_split_price_renders_both_amounts() {
        let (localizer, _) = localizer(rates());
        let message = localizer
            .localized_price_message(&session_in("GB"), 2, None)
            .await
            .unwrap();

        assert!(message.contains("<strong>~GBP 19.75</strong> now and then <strong>~GBP 7.90 per Month</strong>."));
    }

    #[tokio::test]
    async fn test_nudge_only_without_code() {
        let (localizer, _) = localizer(rates());

        let message = localizer
            .localized_price_message(&session_in("ZA"), 1, None)
            .await
            .unwrap();
        assert!(message.contains("~ZAR 1820.00"));
        assert!(message.contains("Use the discount code <strong>LEKKER</strong> to receive a discounted regional price."));

        let message = localizer
            .localized_price_message(&session_in("ZA"), 1, Some("LEKKER"))
            .await
            .unwrap();
        assert!(message.contains("~ZAR 1092.00"));
        assert!(!message.contains("pmpro-local-discount-nudge"));

        // A blank code counts as no code
        let message = localizer
            .localized_price_message(&session_in("ZA"), 1, Some(""))
            .await
            .unwrap();
        assert!(message.contains("pmpro-local-discount-nudge"));
    }

    #[tokio::test]
    async fn test_zero_decimal_currency() {
        let (localizer, _) = localizer(rates());
        let price = localizer.localize(&session_in("JP"), 1, None).await.unwrap();
        assert_eq!(price.initial_display(), "JPY 15000");
    }

    #[tokio::test]
    async fn test_unknown_country_hides_message() {
        let (localizer, source) = localizer(rates());

        let result = localizer.localize(&CheckoutSession::new(), 1, None).await;
        assert!(matches!(result, Err(Suppressed::NoCountry)));

        let result = localizer.localize(&session_in("XX"), 1, None).await;
        assert!(matches!(result, Err(Suppressed::UnmappedCountry(_))));

        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_same_currency_hides_message() {
        let (localizer, source) = localizer(rates().with_rate("USD", "USD", dec!(1)));

        let result = localizer.localize(&session_in("US"), 1, None).await;
        assert!(matches!(result, Err(Suppressed::SameCurrency(_))));
        assert!(localizer.localized_price_message(&session_in("EC"), 1, None).await.is_none());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_implausible_rate_hides_message() {
        let (localizer, _) = localizer(rates());
        let result = localizer.localize(&session_in("KW"), 1, None).await;
        assert!(matches!(result, Err(Suppressed::ImplausibleRate(_))));
    }

    #[tokio::test]
    async fn test_boundary_rate_is_accepted() {
        let (localizer, _) = localizer(MockRateSource::new().with_rate("USD", "EUR", dec!(0.1)));
        let price = localizer.localize(&session_in("DE"), 1, None).await.unwrap();
        assert_eq!(price.initial_display(), "EUR 10.00");
    }

    #[tokio::test]
    async fn test_tiny_amount_hides_message() {
        let (localizer, _) = localizer(rates());
        let result = localizer.localize(&session_in("GB"), 3, None).await;
        assert!(matches!(result, Err(Suppressed::AmountTooSmall(_))));
    }

    #[tokio::test]
    async fn test_upstream_failure_hides_message() {
        let (localizer, _) = localizer(MockRateSource::new().failing_with(500));
        let result = localizer.localize(&session_in("GB"), 1, None).await;
        assert!(matches!(result, Err(Suppressed::RateUnavailable(PricingError::UpstreamStatus(500)))));
    }

    #[tokio::test]
    async fn test_missing_rate_hides_message() {
        let (localizer, _) = localizer(rates());
        let result = localizer.localize(&session_in("FR"), 1, None).await;
        assert!(matches!(
            result,
            Err(Suppressed::RateUnavailable(PricingError::RateUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_level_hides_message() {
        let (localizer, _) = localizer(rates());
        let result = localizer.localize(&session_in("GB"), 42, None).await;
        assert!(matches!(result, Err(Suppressed::UnknownLevel(42))));
    }

    #[test]
    fn test_nudge_code_is_escaped() {
        let price = LocalPrice {
            country: "ZA".into(),
            currency: "ZAR".into(),
            rate: dec!(18),
            initial: dec!(18),
            billing: dec!(18),
            cycle_period: String::new(),
            flat: true,
            nudge_code: Some("<B&B>".into()),
        };
        assert!(price.render().contains("<strong>&lt;B&amp;B&gt;</strong>"));
    }
}
