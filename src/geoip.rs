//! GeoIP resolution over a compressed MaxMind City database, loaded from a
//! local path or a URL and swapped atomically on reload.

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("no GeoIP snapshot loaded yet")]
    NotLoaded,
    #[error("no city record for {0}")]
    NotFound(IpAddr),
    #[error("failed to fetch or parse GeoIP database: {0}")]
    Load(String),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GeoRecord {
    pub country: String,
    pub country_name: String,
    pub continent: String,
    pub city: String,
    pub postal: String,
    pub metro_code: String,
    pub subdivision1: Option<Subdivision>,
    pub subdivision2: Option<Subdivision>,
    /// Descriptive only: authoritative lat/lon for a registration comes
    /// from the IATA row, not this GeoIP-derived value.
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Subdivision {
    pub iso: String,
    pub name: String,
}

#[async_trait]
pub trait GeoIpResolver: Send + Sync {
    async fn reload(&self) -> Result<(), GeoError>;
    fn city(&self, ip: IpAddr) -> Result<GeoRecord, GeoError>;
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, GeoError> {
    if let Some(path) = url.strip_prefix("file://") {
        return tokio::fs::read(path).await.map_err(|e| GeoError::Load(e.to_string()));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        let resp = reqwest::get(url)
            .await
            .map_err(|e| GeoError::Load(e.to_string()))?
            .error_for_status()
            .map_err(|e| GeoError::Load(e.to_string()))?;
        return Ok(resp.bytes().await.map_err(|e| GeoError::Load(e.to_string()))?.to_vec());
    }
    tokio::fs::read(url).await.map_err(|e| GeoError::Load(e.to_string()))
}

/// Wraps a `maxminddb::Reader` snapshot behind an atomic swap. `city` never
/// blocks on the reload lock; it borrows whatever snapshot is current.
pub struct MaxMindGeoIp {
    source_url: String,
    reader: ArcSwapOption<maxminddb::Reader<Vec<u8>>>,
}

impl MaxMindGeoIp {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            reader: ArcSwapOption::empty(),
        }
    }
}

#[async_trait]
impl GeoIpResolver for MaxMindGeoIp {
    async fn reload(&self) -> Result<(), GeoError> {
        let bytes = fetch_bytes(&self.source_url).await?;
        match maxminddb::Reader::from_source(bytes) {
            Ok(reader) => {
                self.reader.store(Some(Arc::new(reader)));
                Ok(())
            }
            Err(e) => {
                // A parse failure must not clear whatever snapshot is
                // already loaded: the previous generation keeps serving.
                error!("GeoIP reload failed, keeping previous snapshot: {}", e);
                Err(GeoError::Load(e.to_string()))
            }
        }
    }

    fn city(&self, ip: IpAddr) -> Result<GeoRecord, GeoError> {
        let guard = self.reader.load();
        let reader = guard.as_ref().ok_or(GeoError::NotLoaded)?;

        let city: maxminddb::geoip2::City = reader.lookup(ip).map_err(|_| GeoError::NotFound(ip))?;

        let country = city
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .unwrap_or_default()
            .to_string();
        let country_name = city
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|n| n.get("en"))
            .copied()
            .unwrap_or_default()
            .to_string();
        let continent = city
            .continent
            .as_ref()
            .and_then(|c| c.code)
            .unwrap_or_default()
            .to_string();
        let city_name = city
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|n| n.get("en"))
            .copied()
            .unwrap_or_default()
            .to_string();
        let postal = city
            .postal
            .as_ref()
            .and_then(|p| p.code)
            .unwrap_or_default()
            .to_string();
        let metro_code = city
            .location
            .as_ref()
            .and_then(|l| l.metro_code)
            .map(|m| m.to_string())
            .unwrap_or_default();
        let (latitude, longitude) = city
            .location
            .as_ref()
            .map(|l| (l.latitude.unwrap_or_default(), l.longitude.unwrap_or_default()))
            .unwrap_or_default();

        let mut subdivisions = city.subdivisions.as_ref().map(|s| s.as_slice()).unwrap_or(&[]).iter();
        let subdivision1 = subdivisions.next().and_then(to_subdivision);
        let subdivision2 = subdivisions.next().and_then(to_subdivision);

        if country.is_empty() {
            warn!("GeoIP lookup for {} returned no country", ip);
        }

        Ok(GeoRecord {
            country,
            country_name,
            continent,
            city: city_name,
            postal,
            metro_code,
            subdivision1,
            subdivision2,
            latitude,
            longitude,
        })
    }
}

fn to_subdivision(s: &maxminddb::geoip2::city::Subdivision) -> Option<Subdivision> {
    let iso = s.iso_code?.to_string();
    let name = s
        .names
        .as_ref()
        .and_then(|n| n.get("en"))
        .copied()
        .unwrap_or_default()
        .to_string();
    Some(Subdivision { iso, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn city_lookup_before_load_fails_not_loaded() {
        let resolver = MaxMindGeoIp::new("file:///nonexistent");
        let err = resolver.city("1.2.3.4".parse().unwrap()).unwrap_err();
        assert!(matches!(err, GeoError::NotLoaded));
    }

    #[tokio::test]
    async fn reload_of_missing_file_does_not_panic() {
        let resolver = MaxMindGeoIp::new("file:///definitely/not/a/real/path.mmdb");
        assert!(resolver.reload().await.is_err());
        // Snapshot remains unset, not torn.
        assert!(matches!(
            resolver.city("1.2.3.4".parse().unwrap()),
            Err(GeoError::NotLoaded)
        ));
    }
}
