//! Pure synthesis of the annotation/heartbeat response pair from validated
//! request parameters plus the resolved geo/ASN/IATA data. No I/O.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

use crate::asn::NetworkRecord;
use crate::geoip::GeoRecord;
use crate::iata::IataRow;
use crate::naming::{machine, site};

#[derive(Debug, Clone)]
pub struct SynthesisInput<'a> {
    pub service: &'a str,
    pub org: &'a str,
    pub project: &'a str,
    pub ipv4: Ipv4Addr,
    pub ipv6: Option<Ipv6Addr>,
    pub iata_row: &'a IataRow,
    pub geo: &'a GeoRecord,
    pub network: &'a NetworkRecord,
    pub probability: f64,
    pub node_type: &'a str,
    pub uplink: &'a str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnnotationGeo {
    pub continent: String,
    pub country: String,
    pub country_name: String,
    pub metro_code: String,
    pub city: String,
    pub postal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision1: Option<crate::geoip::Subdivision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision2: Option<crate::geoip::Subdivision>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Annotation {
    pub site: String,
    pub machine: String,
    pub geo: AnnotationGeo,
    pub network: NetworkRecord,
    pub ipv4: String,
    pub ipv6: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Heartbeat {
    pub city: String,
    pub country: String,
    pub continent: String,
    pub experiment: String,
    pub hostname: String,
    pub latitude: f64,
    pub longitude: f64,
    pub machine: String,
    pub metro: String,
    pub project: String,
    pub probability: f64,
    pub site: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub uplink: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Registration {
    pub hostname: String,
    pub annotation: Annotation,
    pub heartbeat: Heartbeat,
    /// The per-org service-account credential (data model §3). Synthesis
    /// itself is pure and has no credential store to consult, so this is
    /// left empty here and filled in by the `register` handler once it has
    /// fetched or minted the key.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

/// Combines geo, ASN, IATA and caller parameters into the wire response.
/// `geo`'s lat/lon are descriptive only: latitude/longitude in the output
/// always come from `iata_row`.
pub fn synthesize(input: SynthesisInput<'_>) -> Registration {
    let site = site(&input.iata_row.code, input.network.asn);
    let machine = machine(input.ipv4);
    let metro = site[..3.min(site.len())].to_string();
    let hostname = crate::naming::hostname(input.service, &site, &machine, input.org, input.project);

    let annotation = Annotation {
        site: site.clone(),
        machine: machine.clone(),
        geo: AnnotationGeo {
            continent: input.geo.continent.clone(),
            country: input.geo.country.clone(),
            country_name: input.geo.country_name.clone(),
            metro_code: input.geo.metro_code.clone(),
            city: input.geo.city.clone(),
            postal: input.geo.postal.clone(),
            subdivision1: input.geo.subdivision1.clone(),
            subdivision2: input.geo.subdivision2.clone(),
            latitude: input.iata_row.lat,
            longitude: input.iata_row.lon,
        },
        network: input.network.clone(),
        ipv4: format!("{}/32", input.ipv4),
        ipv6: input.ipv6.map(|v6| format!("{}/128", v6)).unwrap_or_default(),
        node_type: "unknown".to_string(),
    };

    let heartbeat = Heartbeat {
        city: input.geo.city.clone(),
        country: input.geo.country.clone(),
        continent: input.geo.continent.clone(),
        experiment: input.service.to_string(),
        hostname: hostname.clone(),
        latitude: input.iata_row.lat,
        longitude: input.iata_row.lon,
        machine,
        metro,
        project: input.project.to_string(),
        probability: input.probability,
        site,
        node_type: input.node_type.to_string(),
        uplink: input.uplink.to_string(),
    };

    Registration {
        hostname,
        annotation,
        heartbeat,
        credentials: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> IataRow {
        IataRow {
            code: "lga".into(),
            country: "US".into(),
            lat: 40.7769,
            lon: -73.8740,
        }
    }

    fn geo() -> GeoRecord {
        GeoRecord {
            country: "US".into(),
            country_name: "United States".into(),
            continent: "NA".into(),
            city: "New York".into(),
            postal: "10001".into(),
            metro_code: "501".into(),
            subdivision1: None,
            subdivision2: None,
            // Deliberately different from the IATA row: descriptive only.
            latitude: 1.0,
            longitude: 2.0,
        }
    }

    fn network() -> NetworkRecord {
        NetworkRecord { asn: 12345, prefix: "192.168.0.0/16".into() }
    }

    #[test]
    fn geo_lat_lon_come_from_iata_row_not_geoip() {
        let row = row();
        let input = SynthesisInput {
            service: "ndt",
            org: "bar",
            project: "mlab-sandbox",
            ipv4: "192.168.0.1".parse().unwrap(),
            ipv6: None,
            iata_row: &row,
            geo: &geo(),
            network: &network(),
            probability: 1.0,
            node_type: "physical",
            uplink: "1g",
        };
        let reg = synthesize(input);
        assert_eq!(reg.annotation.geo.latitude, row.lat);
        assert_eq!(reg.annotation.geo.longitude, row.lon);
        assert_eq!(reg.heartbeat.latitude, reg.annotation.geo.latitude);
    }

    #[test]
    fn metro_is_first_three_chars_of_site() {
        let row = row();
        let input = SynthesisInput {
            service: "ndt",
            org: "bar",
            project: "mlab-sandbox",
            ipv4: "192.168.0.1".parse().unwrap(),
            ipv6: None,
            iata_row: &row,
            geo: &geo(),
            network: &network(),
            probability: 1.0,
            node_type: "physical",
            uplink: "1g",
        };
        let reg = synthesize(input);
        assert_eq!(reg.heartbeat.metro, reg.annotation.site[..3]);
    }

    #[test]
    fn fresh_registration_produces_expected_hostname() {
        let row = row();
        let input = SynthesisInput {
            service: "ndt",
            org: "bar",
            project: "mlab-sandbox",
            ipv4: "192.168.0.1".parse().unwrap(),
            ipv6: None,
            iata_row: &row,
            geo: &geo(),
            network: &network(),
            probability: 1.0,
            node_type: "physical",
            uplink: "1g",
        };
        let reg = synthesize(input);
        assert_eq!(reg.hostname, "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org");
    }

    #[test]
    fn ipv6_is_rendered_with_slash_128_when_present() {
        let row = row();
        let input = SynthesisInput {
            service: "ndt",
            org: "bar",
            project: "mlab-sandbox",
            ipv4: "192.168.0.1".parse().unwrap(),
            ipv6: Some("fe80::1002:161f:ae39:a2c9".parse().unwrap()),
            iata_row: &row,
            geo: &geo(),
            network: &network(),
            probability: 1.0,
            node_type: "physical",
            uplink: "1g",
        };
        let reg = synthesize(input);
        assert_eq!(reg.annotation.ipv6, "fe80::1002:161f:ae39:a2c9/128");
    }
}
