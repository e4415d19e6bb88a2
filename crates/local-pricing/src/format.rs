//! Display helpers for prices and markup

use rust_decimal::{Decimal, RoundingStrategy};

use crate::currency::currency_decimals;

/// Round to the currency's minor unit and render with exactly that many decimals
///
/// Decimals follow the target currency, not the site currency, so a USD site
/// shows `JPY 15000` rather than `JPY 15000.00`.
pub fn round_price_as_string(amount: Decimal, currency: &str) -> String {
    let decimals = currency_decimals(currency);
    let rounded = amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", decimals as usize, rounded)
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
