//! Shared application state threaded through `axum::extract::State`. Every
//! collaborator is a trait object behind an `Arc` so tests can supply fakes
//! in place of the real IATA table, GeoIP resolver, ASN annotator, DNS
//! provider and key/credential stores.

use std::sync::Arc;

use semver::Version;

use crate::asn::AsnAnnotator;
use crate::dns::DnsProvider;
use crate::geoip::GeoIpResolver;
use crate::iata::IataTable;
use crate::metrics::Metrics;
use crate::store::{CredentialStore, KeyStore};
use crate::tracker::LivenessTracker;

#[derive(Clone)]
pub struct AppState {
    pub iata: Arc<dyn IataTable>,
    pub geoip: Arc<dyn GeoIpResolver>,
    pub asn: Arc<dyn AsnAnnotator>,
    pub key_store: Arc<dyn KeyStore>,
    pub credential_store: Arc<dyn CredentialStore>,
    pub dns_provider: Arc<dyn DnsProvider>,
    pub tracker: Arc<LivenessTracker>,
    pub metrics: Arc<dyn Metrics>,
    pub project: String,
    pub min_version: Version,
}
