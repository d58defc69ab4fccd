//! In-process fakes for the injected capability traits, following the
//! teacher's convention of hand-rolled fakes behind the same trait rather
//! than a mocking framework. Compiled unconditionally (not `#[cfg(test)]`)
//! so integration tests under `tests/` can use them too.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::asn::{AsnAnnotator, AsnError, NetworkRecord};
use crate::dns::provider::{DnsError, DnsProvider};
use crate::dns::types::{ChangeSet, RecordSet, RecordType};
use crate::geoip::{GeoError, GeoIpResolver, GeoRecord};

pub use crate::store::{InMemoryCredentialStore, InMemoryKeyStore, InMemoryLivenessStore};

/// A `GeoIpResolver` that always returns the same record, for tests that
/// don't want to ship a real MaxMind database alongside the crate.
pub struct StaticGeoIpResolver(pub GeoRecord);

#[async_trait]
impl GeoIpResolver for StaticGeoIpResolver {
    async fn reload(&self) -> Result<(), GeoError> {
        Ok(())
    }

    fn city(&self, _ip: IpAddr) -> Result<GeoRecord, GeoError> {
        Ok(self.0.clone())
    }
}

/// An `AsnAnnotator` that always returns the same record, for tests that
/// don't want to ship a routeview dataset alongside the crate.
pub struct StaticAsnAnnotator(pub NetworkRecord);

#[async_trait]
impl AsnAnnotator for StaticAsnAnnotator {
    async fn reload(&self) -> Result<(), AsnError> {
        Ok(())
    }

    fn annotate(&self, _ip: Ipv4Addr) -> Result<NetworkRecord, AsnError> {
        Ok(self.0.clone())
    }
}

/// An in-memory DNS provider modeling the real service closely enough for
/// tests: record sets keyed by `(zone, name, type)`, atomic-looking change
/// application, 404-shaped `NotFound` on missing lookups.
#[derive(Default)]
pub struct FakeDnsProvider {
    records: Mutex<HashMap<(String, String, RecordType), RecordSet>>,
    fail_deletes: bool,
}

impl FakeDnsProvider {
    /// A provider whose `change_create` always fails, simulating a
    /// transient DNS-provider outage.
    pub fn failing_deletes() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_deletes: true,
        }
    }

    fn key(zone: &str, name: &str, record_type: RecordType) -> (String, String, RecordType) {
        (zone.to_string(), name.to_string(), record_type)
    }
}

#[async_trait]
impl DnsProvider for FakeDnsProvider {
    async fn record_set_get(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        self.records
            .lock()
            .unwrap()
            .get(&Self::key(zone, name, record_type))
            .cloned()
            .ok_or(DnsError::NotFound)
    }

    async fn change_create(
        &self,
        _project: &str,
        zone: &str,
        changes: ChangeSet,
    ) -> Result<ChangeSet, DnsError> {
        if self.fail_deletes {
            return Err(DnsError::Provider("simulated transient failure".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        for deletion in &changes.deletions {
            records.remove(&Self::key(zone, &deletion.name, deletion.record_type));
        }
        for addition in &changes.additions {
            records.insert(
                Self::key(zone, &addition.name, addition.record_type),
                addition.clone(),
            );
        }
        Ok(changes)
    }

    async fn managed_zone_get(&self, _project: &str, _zone: &str) -> Result<(), DnsError> {
        Ok(())
    }

    async fn managed_zone_create(&self, _project: &str, _zone: &str, _dns_name: &str) -> Result<(), DnsError> {
        Ok(())
    }
}
