//! Country to Currency Mapping
//!
//! Static ISO 3166-1 alpha-2 to ISO 4217 table, extensible with overrides
//! from configuration.

use std::collections::HashMap;

/// Currencies with no minor unit in display
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "UYI", "VND",
    "VUV", "XAF", "XOF", "XPF",
];

/// Country code, currency code
const COUNTRY_CURRENCIES: &[(&str, &str)] = &[
    ("AD", "EUR"), ("AE", "AED"), ("AF", "AFN"), ("AG", "XCD"), ("AI", "XCD"),
    ("AL", "ALL"), ("AM", "AMD"), ("AO", "AOA"), ("AR", "ARS"), ("AS", "USD"),
    ("AT", "EUR"), ("AU", "AUD"), ("AW", "AWG"), ("AX", "EUR"), ("AZ", "AZN"),
    ("BA", "BAM"), ("BB", "BBD"), ("BD", "BDT"), ("BE", "EUR"), ("BF", "XOF"),
    ("BG", "BGN"), ("BH", "BHD"), ("BI", "BIF"), ("BJ", "XOF"), ("BL", "EUR"),
    ("BM", "BMD"), ("BN", "BND"), ("BO", "BOB"), ("BQ", "USD"), ("BR", "BRL"),
    ("BS", "BSD"), ("BT", "BTN"), ("BV", "NOK"), ("BW", "BWP"), ("BY", "BYN"),
    ("BZ", "BZD"), ("CA", "CAD"), ("CC", "AUD"), ("CD", "CDF"), ("CF", "XAF"),
    ("CG", "XAF"), ("CH", "CHF"), ("CI", "XOF"), ("CK", "NZD"), ("CL", "CLP"),
    ("CM", "XAF"), ("CN", "CNY"), ("CO", "COP"), ("CR", "CRC"), ("CU", "CUP"),
    ("CV", "CVE"), ("CW", "ANG"), ("CX", "AUD"), ("CY", "EUR"), ("CZ", "CZK"),
    ("DE", "EUR"), ("DJ", "DJF"), ("DK", "DKK"), ("DM", "XCD"), ("DO", "DOP"),
    ("DZ", "DZD"), ("EC", "USD"), ("EE", "EUR"), ("EG", "EGP"), ("EH", "MAD"),
    ("ER", "ERN"), ("ES", "EUR"), ("ET", "ETB"), ("FI", "EUR"), ("FJ", "FJD"),
    ("FK", "FKP"), ("FM", "USD"), ("FO", "DKK"), ("FR", "EUR"), ("GA", "XAF"),
    ("GB", "GBP"), ("GD", "XCD"), ("GE", "GEL"), ("GF", "EUR"), ("GG", "GBP"),
    ("GH", "GHS"), ("GI", "GIP"), ("GL", "DKK"), ("GM", "GMD"), ("GN", "GNF"),
    ("GP", "EUR"), ("GQ", "XAF"), ("GR", "EUR"), ("GS", "GBP"), ("GT", "GTQ"),
    ("GU", "USD"), ("GW", "XOF"), ("GY", "GYD"), ("HK", "HKD"), ("HM", "AUD"),
    ("HN", "HNL"), ("HR", "EUR"), ("HT", "HTG"), ("HU", "HUF"), ("ID", "IDR"),
    ("IE", "EUR"), ("IL", "ILS"), ("IM", "GBP"), ("IN", "INR"), ("IO", "USD"),
    ("IQ", "IQD"), ("IR", "IRR"), ("IS", "ISK"), ("IT", "EUR"), ("JE", "GBP"),
    ("JM", "JMD"), ("JO", "JOD"), ("JP", "JPY"), ("KE", "KES"), ("KG", "KGS"),
    ("KH", "KHR"), ("KI", "AUD"), ("KM", "KMF"), ("KN", "XCD"), ("KP", "KPW"),
    ("KR", "KRW"), ("KW", "KWD"), ("KY", "KYD"), ("KZ", "KZT"), ("LA", "LAK"),
    ("LB", "LBP"), ("LC", "XCD"), ("LI", "CHF"), ("LK", "LKR"), ("LR", "LRD"),
    ("LS", "LSL"), ("LT", "EUR"), ("LU", "EUR"), ("LV", "EUR"), ("LY", "LYD"),
    ("MA", "MAD"), ("MC", "EUR"), ("MD", "MDL"), ("ME", "EUR"), ("MF", "EUR"),
    ("MG", "MGA"), ("MH", "USD"), ("MK", "MKD"), ("ML", "XOF"), ("MM", "MMK"),
    ("MN", "MNT"), ("MO", "MOP"), ("MP", "USD"), ("MQ", "EUR"), ("MR", "MRU"),
    ("MS", "XCD"), ("MT", "EUR"), ("MU", "MUR"), ("MV", "MVR"), ("MW", "MWK"),
    ("MX", "MXN"), ("MY", "MYR"), ("MZ", "MZN"), ("NA", "NAD"), ("NC", "XPF"),
    ("NE", "XOF"), ("NF", "AUD"), ("NG", "NGN"), ("NI", "NIO"), ("NL", "EUR"),
    ("NO", "NOK"), ("NP", "NPR"), ("NR", "AUD"), ("NU", "NZD"), ("NZ", "NZD"),
    ("OM", "OMR"), ("PA", "PAB"), ("PE", "PEN"), ("PF", "XPF"), ("PG", "PGK"),
    ("PH", "PHP"), ("PK", "PKR"), ("PL", "PLN"), ("PM", "EUR"), ("PN", "NZD"),
    ("PR", "USD"), ("PS", "ILS"), ("PT", "EUR"), ("PW", "USD"), ("PY", "PYG"),
    ("QA", "QAR"), ("RE", "EUR"), ("RO", "RON"), ("RS", "RSD"), ("RU", "RUB"),
    ("RW", "RWF"), ("SA", "SAR"), ("SB", "SBD"), ("SC", "SCR"), ("SD", "SDG"),
    ("SE", "SEK"), ("SG", "SGD"), ("SH", "SHP"), ("SI", "EUR"), ("SJ", "NOK"),
    ("SK", "EUR"), ("SL", "SLE"), ("SM", "EUR"), ("SN", "XOF"), ("SO", "SOS"),
    ("SR", "SRD"), ("SS", "SSP"), ("ST", "STN"), ("SV", "USD"), ("SX", "ANG"),
    ("SY", "SYP"), ("SZ", "SZL"), ("TC", "USD"), ("TD", "XAF"), ("TF", "EUR"),
    ("TG", "XOF"), ("TH", "THB"), ("TJ", "TJS"), ("TK", "NZD"), ("TL", "USD"),
    ("TM", "TMT"), ("TN", "TND"), ("TO", "TOP"), ("TR", "TRY"), ("TT", "TTD"),
    ("TV", "AUD"), ("TW", "TWD"), ("TZ", "TZS"), ("UA", "UAH"), ("UG", "UGX"),
    ("UM", "USD"), ("US", "USD"), ("UY", "UYU"), ("UZ", "UZS"), ("VA", "EUR"),
    ("VC", "XCD"), ("VE", "VES"), ("VG", "USD"), ("VI", "USD"), ("VN", "VND"),
    ("VU", "VUV"), ("WF", "XPF"), ("WS", "WST"), ("YE", "YER"), ("YT", "EUR"),
    ("ZA", "ZAR"), ("ZM", "ZMW"), ("ZW", "USD"),
];

/// Number of decimals a currency is displayed with
pub fn currency_decimals(currency: &str) -> u32 {
    let currency = currency.to_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.as_str()) {
        0
    } else {
        2
    }
}

/// Country to currency lookup
#[derive(Clone, Debug)]
pub struct CurrencyMapper {
    table: HashMap<String, String>,
}

impl Default for CurrencyMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyMapper {
    pub fn new() -> Self {
        let table = COUNTRY_CURRENCIES
            .iter()
            .map(|(country, currency)| ((*country).to_string(), (*currency).to_string()))
            .collect();
        Self { table }
    }

    /// Add or replace entries; later entries win
    pub fn with_overrides<I, C, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<str>,
        V: AsRef<str>,
    {
        for (country, currency) in overrides {
            self.table.insert(
                country.as_ref().trim().to_uppercase(),
                currency.as_ref().trim().to_uppercase(),
            );
        }
        self
    }

    pub fn currency_for_country(&self, country: &str) -> Option<&str> {
        self.table
            .get(&country.trim().to_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
