//! MaxMind GeoLite2 Country database

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use tracing::trace;

use super::GeoIpLookup;
use crate::error::{PricingError, Result};

/// Country lookups against a local `.mmdb` file
pub struct MaxMindCountryReader {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindCountryReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .map_err(|e| PricingError::GeoIp(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindCountryReader {
    async fn country(&self, ip: &str) -> Option<String> {
        let ip_addr: IpAddr = ip.parse().ok()?;

        let result = self.reader.lookup(ip_addr).ok()?;
        let record: geoip2::Country = result.decode().ok()??;

        let country = record.country.iso_code.map(String::from);
        trace!("MaxMind lookup for {}: country={:?}", ip, country);

        country
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
