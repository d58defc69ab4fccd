//! Trait boundary to the external authoritative DNS API.
//! `GoogleCloudDnsProvider` talks to the real service over HTTP; fakes live
//! in [`crate::testing`].

use async_trait::async_trait;

use super::types::{ChangeSet, RecordSet, RecordType};

#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    #[error("record set not found")]
    NotFound,
    #[error("managed zone not found")]
    ZoneNotFound,
    #[error("provider accepted the change but staged no additions")]
    IncompleteChange,
    #[error("DNS provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn record_set_get(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError>;

    async fn change_create(
        &self,
        project: &str,
        zone: &str,
        changes: ChangeSet,
    ) -> Result<ChangeSet, DnsError>;

    async fn managed_zone_get(&self, project: &str, zone: &str) -> Result<(), DnsError>;

    async fn managed_zone_create(&self, project: &str, zone: &str, dns_name: &str) -> Result<(), DnsError>;
}
