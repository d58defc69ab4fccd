//! HTTP client for Google Cloud DNS, the authoritative DNS provider this
//! service targets in production: a thin `reqwest`-backed struct
//! implementing the capability trait, one request per operation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::provider::{DnsError, DnsProvider};
use super::types::{ChangeSet, RecordSet, RecordType};

pub struct GoogleCloudDnsProvider {
    api_base: Url,
    client: reqwest::Client,
}

impl GoogleCloudDnsProvider {
    pub fn new(api_base: Url, client: reqwest::Client) -> Self {
        Self { api_base, client }
    }

    fn record_sets_url(&self, project: &str, zone: &str) -> Url {
        let mut url = self.api_base.clone();
        url.set_path(&format!("/dns/v1/projects/{project}/managedZones/{zone}/rrsets"));
        url
    }

    fn managed_zones_url(&self, project: &str) -> Url {
        let mut url = self.api_base.clone();
        url.set_path(&format!("/dns/v1/projects/{project}/managedZones"));
        url
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRecordSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    ttl: i64,
    rrdatas: Vec<String>,
}

impl From<RecordSet> for WireRecordSet {
    fn from(rs: RecordSet) -> Self {
        WireRecordSet {
            name: rs.name,
            record_type: rs.record_type.as_str().to_string(),
            ttl: rs.ttl,
            rrdatas: rs.rrdata,
        }
    }
}

impl TryFrom<WireRecordSet> for RecordSet {
    type Error = DnsError;

    fn try_from(wire: WireRecordSet) -> Result<Self, DnsError> {
        let record_type = match wire.record_type.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "NS" => RecordType::Ns,
            other => return Err(DnsError::Provider(format!("unexpected record type {other}"))),
        };
        Ok(RecordSet {
            name: wire.name,
            record_type,
            ttl: wire.ttl,
            rrdata: wire.rrdatas,
        })
    }
}

#[derive(Debug, Serialize)]
struct WireChange {
    additions: Vec<WireRecordSet>,
    deletions: Vec<WireRecordSet>,
}

#[derive(Debug, Deserialize)]
struct WireChangeResponse {
    #[serde(default)]
    additions: Vec<WireRecordSet>,
    #[serde(default)]
    deletions: Vec<WireRecordSet>,
}

#[async_trait]
impl DnsProvider for GoogleCloudDnsProvider {
    async fn record_set_get(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<RecordSet, DnsError> {
        let mut url = self.record_sets_url(project, zone);
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("type", record_type.as_str());

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DnsError::Provider(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DnsError::NotFound);
        }
        let resp = resp.error_for_status().map_err(|e| DnsError::Provider(e.to_string()))?;

        #[derive(Deserialize)]
        struct ListResponse {
            #[serde(default)]
            rrsets: Vec<WireRecordSet>,
        }
        let body: ListResponse = resp.json().await.map_err(|e| DnsError::Provider(e.to_string()))?;
        body.rrsets.into_iter().next().ok_or(DnsError::NotFound)?.try_into()
    }

    async fn change_create(
        &self,
        project: &str,
        zone: &str,
        changes: ChangeSet,
    ) -> Result<ChangeSet, DnsError> {
        let mut url = self.api_base.clone();
        url.set_path(&format!("/dns/v1/projects/{project}/managedZones/{zone}/changes"));

        let wire = WireChange {
            additions: changes.additions.into_iter().map(Into::into).collect(),
            deletions: changes.deletions.into_iter().map(Into::into).collect(),
        };

        let resp = self
            .client
            .post(url)
            .json(&wire)
            .send()
            .await
            .map_err(|e| DnsError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| DnsError::Provider(e.to_string()))?;

        let body: WireChangeResponse = resp.json().await.map_err(|e| DnsError::Provider(e.to_string()))?;

        Ok(ChangeSet {
            additions: body
                .additions
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            deletions: body
                .deletions
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn managed_zone_get(&self, project: &str, zone: &str) -> Result<(), DnsError> {
        let mut url = self.managed_zones_url(project);
        url.set_path(&format!("{}/{}", url.path(), zone));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DnsError::Provider(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DnsError::ZoneNotFound);
        }
        resp.error_for_status().map_err(|e| DnsError::Provider(e.to_string()))?;
        Ok(())
    }

    async fn managed_zone_create(&self, project: &str, zone: &str, dns_name: &str) -> Result<(), DnsError> {
        #[derive(Serialize)]
        struct CreateZone<'a> {
            name: &'a str,
            #[serde(rename = "dnsName")]
            dns_name: &'a str,
        }

        self.client
            .post(self.managed_zones_url(project))
            .json(&CreateZone { name: zone, dns_name })
            .send()
            .await
            .map_err(|e| DnsError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| DnsError::Provider(e.to_string()))?;
        Ok(())
    }
}
