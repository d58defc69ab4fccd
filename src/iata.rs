//! IATA airport table: nearest-airport-in-country lookup, keyed by code.
//!
//! Mirrors the atomic-swap discipline the gateway uses for its sphere
//! storage snapshots: readers never observe a torn table, and a failed
//! reload never clears what is already loaded.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct IataRow {
    pub code: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IataError {
    #[error("no airports loaded for country {0:?}")]
    NoAirportsInCountry(String),
    #[error("no airport row for code {0:?}")]
    NotFound(String),
    #[error("failed to load IATA source: {0}")]
    Load(String),
}

#[async_trait]
pub trait IataTable: Send + Sync {
    /// Re-reads the source and atomically swaps the in-memory table.
    async fn load(&self) -> Result<(), IataError>;

    /// Nearest airport in `country` by great-circle distance.
    fn lookup(&self, country: &str, lat: f64, lon: f64) -> Result<String, IataError>;

    /// Row lookup by code.
    fn find(&self, code: &str) -> Result<IataRow, IataError>;

    /// Whether at least one successful `load` has populated the table.
    /// Used by the `/readyz` endpoint so the service doesn't advertise
    /// readiness before it can resolve registrations.
    fn is_loaded(&self) -> bool;
}

fn great_circle_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Parses the `country,code,lat,lon` source format. Rows with malformed
/// lat/lon are skipped with a warning rather than failing the whole load.
fn parse_rows(source: &str) -> Vec<IataRow> {
    let mut rows = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 4 {
            warn!(line = line_no, "skipping malformed IATA row: {}", line);
            continue;
        }
        let (country, code, lat, lon) = (fields[0].trim(), fields[1].trim(), fields[2].trim(), fields[3].trim());
        match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => rows.push(IataRow {
                code: code.to_lowercase(),
                country: country.to_string(),
                lat,
                lon,
            }),
            _ => warn!(line = line_no, "skipping IATA row with malformed lat/lon: {}", line),
        }
    }
    rows
}

/// Fetches the source from a local file, `http(s)://` URL, or `gs://` object
/// store URL, dispatched on scheme exactly as the GeoIP/ASN loaders do.
async fn fetch_source(url: &str) -> Result<String, IataError> {
    if let Some(path) = url.strip_prefix("file://") {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IataError::Load(e.to_string()));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        let body = reqwest::get(url)
            .await
            .map_err(|e| IataError::Load(e.to_string()))?
            .error_for_status()
            .map_err(|e| IataError::Load(e.to_string()))?
            .text()
            .await
            .map_err(|e| IataError::Load(e.to_string()))?;
        return Ok(body);
    }
    // Treat anything else (including gs://) as a plain filesystem path for
    // object stores mounted via FUSE, matching how the gateway treats local
    // sphere paths.
    tokio::fs::read_to_string(url)
        .await
        .map_err(|e| IataError::Load(e.to_string()))
}

pub struct RemoteIataTable {
    source_url: String,
    rows: ArcSwap<Vec<IataRow>>,
}

impl RemoteIataTable {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            rows: ArcSwap::from(Arc::new(Vec::new())),
        }
    }

    pub fn from_rows(rows: Vec<IataRow>) -> Self {
        Self {
            source_url: String::new(),
            rows: ArcSwap::from(Arc::new(rows)),
        }
    }
}

#[async_trait]
impl IataTable for RemoteIataTable {
    async fn load(&self) -> Result<(), IataError> {
        let source = fetch_source(&self.source_url).await?;
        let rows = parse_rows(&source);
        self.rows.store(Arc::new(rows));
        Ok(())
    }

    fn lookup(&self, country: &str, lat: f64, lon: f64) -> Result<String, IataError> {
        let rows = self.rows.load();
        rows.iter()
            .filter(|row| row.country.eq_ignore_ascii_case(country))
            .min_by(|a, b| {
                great_circle_km(lat, lon, a.lat, a.lon)
                    .partial_cmp(&great_circle_km(lat, lon, b.lat, b.lon))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|row| row.code.clone())
            .ok_or_else(|| IataError::NoAirportsInCountry(country.to_string()))
    }

    fn find(&self, code: &str) -> Result<IataRow, IataError> {
        let code = code.to_lowercase();
        self.rows
            .load()
            .iter()
            .find(|row| row.code == code)
            .cloned()
            .ok_or_else(|| IataError::NotFound(code))
    }

    fn is_loaded(&self) -> bool {
        !self.rows.load().is_empty()
    }
}
