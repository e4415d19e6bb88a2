//! Visitor Geolocation
//!
//! Country lookup by IP address and the per-session resolution rules built
//! on top of it.

mod maxmind;
mod mock;

pub use maxmind::MaxMindCountryReader;
pub use mock::MockGeoIp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::session::{CheckoutSession, LocationState};

/// GeoIP lookup trait (Strategy pattern)
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// ISO 3166-1 alpha-2 country code for an IP, if known
    async fn country(&self, ip: &str) -> Option<String>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Used when no database is configured; every lookup misses
pub struct DisabledGeoIp;

#[async_trait]
impl GeoIpLookup for DisabledGeoIp {
    async fn country(&self, _ip: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "Disabled"
    }
}

/// What to keep in the session after a failed lookup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupFailurePolicy {
    /// Keep nothing; the next call looks up again
    #[default]
    Retry,

    /// Remember the miss until the session's country is cleared
    Remember,
}

/// Loopback and empty addresses never reach the database
pub fn is_local_address(ip: &str) -> bool {
    let ip = ip.trim();
    ip.is_empty() || ip == "127.0.0.1" || ip == "::1"
}

/// Resolves and caches the visitor's country on a checkout session
pub struct LocationResolver {
    geoip: Arc<dyn GeoIpLookup>,
    policy: LookupFailurePolicy,
    test_ip: Option<String>,
}

impl LocationResolver {
    pub fn new(geoip: Arc<dyn GeoIpLookup>) -> Self {
        Self {
            geoip,
            policy: LookupFailurePolicy::default(),
            test_ip: None,
        }
    }

    pub fn with_policy(mut self, policy: LookupFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a fixed IP instead of the visitor's (local development)
    pub fn with_test_ip(mut self, ip: Option<String>) -> Self {
        self.test_ip = ip.filter(|ip| !ip.trim().is_empty());
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.geoip.name()
    }

    /// Country for this session, looking it up at most once per success
    pub async fn resolve_country(&self, session: &mut CheckoutSession, ip: &str) -> Option<String> {
        match &session.location {
            LocationState::Resolved(country) => return Some(country.clone()),
            LocationState::Unknown if self.policy == LookupFailurePolicy::Remember => return None,
            _ => {}
        }

        let ip = self.test_ip.as_deref().unwrap_or(ip).trim();

        if is_local_address(ip) {
            trace!("Skipping GeoIP lookup for local address {:?}", ip);
            return None;
        }

        let country = self
            .geoip
            .country(ip)
            .await
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        match country {
            Some(country) => {
                debug!("Resolved {} to {} via {}", ip, country, self.geoip.name());
                session.set_country(country.clone());
                Some(country)
            }
            None => {
                debug!("No country for {} via {}", ip, self.geoip.name());
                if self.policy == LookupFailurePolicy::Remember {
                    session.mark_unknown();
                }
                None
            }
        }
    }
}
