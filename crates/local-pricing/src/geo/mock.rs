//! Mock GeoIP lookup
//!
//! Static IP table for tests and local demos. Counts every lookup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::GeoIpLookup;

#[derive(Default)]
pub struct MockGeoIp {
    entries: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl MockGeoIp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: impl Into<String>, country: impl Into<String>) -> Self {
        self.entries.insert(ip.into(), country.into());
        self
    }

    /// Number of lookups performed so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoIpLookup for MockGeoIp {
    async fn country(&self, ip: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.entries.get(ip).cloned()
    }

    fn name(&self) -> &'static str {
        "MockGeoIp"
    }
}
