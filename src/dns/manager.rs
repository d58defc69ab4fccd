//! Diff-and-apply layer over the DNS provider's transactional change-set
//! primitive: reconciles the desired A/AAAA state for a hostname against
//! whatever the provider currently reports, staging only the records that
//! actually need to change.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tracing::{debug, info};

use super::provider::{DnsError, DnsProvider};
use super::types::{Change, ChangeSet, RecordSet, RecordType};

pub struct DnsManager {
    project: String,
    zone: String,
    provider: Arc<dyn DnsProvider>,
}

impl DnsManager {
    pub fn new(project: impl Into<String>, zone: impl Into<String>, provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            provider,
        }
    }

    /// Stages an addition or replacement for one record type if the current
    /// record set doesn't already match `desired_value`. Returns `None` when
    /// no record exists yet and an addition was staged, `Some(existing)` when
    /// a replacement was staged, and leaves the change sets untouched when
    /// the record already matches.
    async fn reconcile_one(
        &self,
        fqdn: &str,
        record_type: RecordType,
        desired_value: &str,
        changes: &mut ChangeSet,
    ) -> Result<(), DnsError> {
        match self
            .provider
            .record_set_get(&self.project, &self.zone, fqdn, record_type)
            .await
        {
            Err(DnsError::NotFound) => {
                changes
                    .additions
                    .push(RecordSet::new(fqdn, record_type, vec![desired_value.to_string()]));
                Ok(())
            }
            Ok(existing) => {
                if existing.rrdata.len() == 1 && existing.rrdata[0] == desired_value {
                    debug!(fqdn, ?record_type, "record already matches desired value");
                } else {
                    changes.deletions.push(existing);
                    changes
                        .additions
                        .push(RecordSet::new(fqdn, record_type, vec![desired_value.to_string()]));
                }
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Brings the authoritative DNS into agreement with `(fqdn, ipv4, ipv6)`.
    /// `fqdn` must end in `"."`.
    pub async fn register(
        &self,
        fqdn: &str,
        ipv4: Ipv4Addr,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<Change, DnsError> {
        debug_assert!(fqdn.ends_with('.'), "fqdn must be fully qualified");

        let mut changes = ChangeSet::default();
        self.reconcile_one(fqdn, RecordType::A, &ipv4.to_string(), &mut changes).await?;
        if let Some(ipv6) = ipv6 {
            self.reconcile_one(fqdn, RecordType::Aaaa, &ipv6.to_string(), &mut changes).await?;
        }

        if changes.is_empty() {
            return Ok(Change::NoChange);
        }

        let applied = self.provider.change_create(&self.project, &self.zone, changes).await?;
        info!(fqdn, "applied DNS change for registration");
        Ok(Change::Applied(applied))
    }

    /// Deletes both A and AAAA records for `fqdn`. Always calls the
    /// provider, even with an empty change set, mirroring the provider's
    /// tolerance for idempotent deletes.
    pub async fn delete(&self, fqdn: &str) -> Result<Change, DnsError> {
        debug_assert!(fqdn.ends_with('.'), "fqdn must be fully qualified");

        let mut changes = ChangeSet::default();
        for record_type in [RecordType::A, RecordType::Aaaa] {
            match self
                .provider
                .record_set_get(&self.project, &self.zone, fqdn, record_type)
                .await
            {
                Ok(existing) => changes.deletions.push(existing),
                Err(DnsError::NotFound) => {}
                Err(other) => return Err(other),
            }
        }

        let applied = self.provider.change_create(&self.project, &self.zone, changes).await?;
        info!(fqdn, "applied DNS change for delete");
        Ok(Change::Applied(applied))
    }

    /// Idempotently ensures a managed zone exists. Used by the out-of-core
    /// admin tool; not part of the registration hot path.
    pub async fn register_zone(&self, dns_name: &str) -> Result<(), DnsError> {
        match self.provider.managed_zone_get(&self.project, &self.zone).await {
            Ok(()) => Ok(()),
            Err(DnsError::ZoneNotFound) => {
                self.provider.managed_zone_create(&self.project, &self.zone, dns_name).await
            }
            Err(other) => Err(other),
        }
    }

    /// Ensures the parent zone carries an NS record delegating this child
    /// zone, by reading the child's NS set and grafting it into the parent
    /// via a change set.
    pub async fn register_zone_split(
        &self,
        parent_zone: &str,
        child_fqdn: &str,
    ) -> Result<Change, DnsError> {
        let child_ns = self
            .provider
            .record_set_get(&self.project, &self.zone, child_fqdn, RecordType::Ns)
            .await;

        let mut changes = ChangeSet::default();
        match child_ns {
            Ok(existing) => changes.additions.push(existing),
            Err(DnsError::NotFound) => {}
            Err(other) => return Err(other),
        }

        let applied = self
            .provider
            .change_create(&self.project, parent_zone, changes)
            .await?;

        if applied.additions.is_empty() {
            return Err(DnsError::IncompleteChange);
        }

        Ok(Change::Applied(applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDnsProvider;

    fn manager(provider: Arc<FakeDnsProvider>) -> DnsManager {
        DnsManager::new("mlab-sandbox", "autojoin-bar-sandbox-measurement-lab-org", provider)
    }

    #[tokio::test]
    async fn register_on_empty_zone_stages_one_addition() {
        let provider = Arc::new(FakeDnsProvider::default());
        let manager = manager(provider.clone());

        let change = manager
            .register("ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org.", "192.168.0.1".parse().unwrap(), None)
            .await
            .unwrap();

        match change {
            Change::Applied(set) => {
                assert_eq!(set.additions.len(), 1);
                assert!(set.deletions.is_empty());
                assert_eq!(set.additions[0].record_type, RecordType::A);
                assert_eq!(set.additions[0].ttl, 300);
            }
            Change::NoChange => panic!("expected a change"),
        }
    }

    #[tokio::test]
    async fn register_is_idempotent_when_record_already_matches() {
        let provider = Arc::new(FakeDnsProvider::default());
        let manager = manager(provider.clone());
        let fqdn = "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org.";

        manager.register(fqdn, "192.168.0.1".parse().unwrap(), None).await.unwrap();
        let second = manager.register(fqdn, "192.168.0.1".parse().unwrap(), None).await.unwrap();

        assert_eq!(second, Change::NoChange);
    }

    #[tokio::test]
    async fn ipv6_replacement_only_touches_aaaa() {
        let provider = Arc::new(FakeDnsProvider::default());
        let manager = manager(provider.clone());
        let fqdn = "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org.";

        manager
            .register(fqdn, "192.168.0.1".parse().unwrap(), Some("abc:def::1".parse().unwrap()))
            .await
            .unwrap();

        let change = manager
            .register(
                fqdn,
                "192.168.0.1".parse().unwrap(),
                Some("fe80::1002:161f:ae39:a2c9".parse().unwrap()),
            )
            .await
            .unwrap();

        match change {
            Change::Applied(set) => {
                assert_eq!(set.additions.len(), 1);
                assert_eq!(set.deletions.len(), 1);
                assert_eq!(set.additions[0].record_type, RecordType::Aaaa);
                assert_eq!(set.deletions[0].rrdata, vec!["abc:def::1".to_string()]);
            }
            Change::NoChange => panic!("expected a change"),
        }
    }

    #[tokio::test]
    async fn delete_calls_provider_even_with_nothing_to_delete() {
        let provider = Arc::new(FakeDnsProvider::default());
        let manager = manager(provider.clone());

        let change = manager.delete("nothing-here.bar.sandbox.measurement-lab.org.").await.unwrap();
        assert_eq!(change, Change::Applied(ChangeSet::default()));
    }

    #[tokio::test]
    async fn delete_then_register_restores_records() {
        let provider = Arc::new(FakeDnsProvider::default());
        let manager = manager(provider.clone());
        let fqdn = "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org.";

        manager.register(fqdn, "192.168.0.1".parse().unwrap(), None).await.unwrap();
        manager.delete(fqdn).await.unwrap();
        let change = manager.register(fqdn, "192.168.0.1".parse().unwrap(), None).await.unwrap();

        assert!(matches!(change, Change::Applied(_)));
    }
}
