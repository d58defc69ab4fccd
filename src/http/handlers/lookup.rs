//! `GET /v0/lookup` (unauthenticated): resolves a nearest IATA code from an
//! explicit query, platform hint headers, or a GeoIP lookup of the caller's
//! address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::AppError;
use crate::http::state::AppState;
use crate::http::Pretty;

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub lookup: LookupBody,
}

#[derive(Debug, Serialize)]
pub struct LookupBody {
    pub iata: String,
}

const APPENGINE_LATLONG_SENTINEL: &str = "0.000000,0.000000";

fn resolve_country(
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    geoip_country: impl FnOnce() -> Option<String>,
) -> Option<String> {
    if let Some(country) = query.get("country") {
        return Some(country.clone());
    }
    if let Some(header) = headers.get("X-AppEngine-Country").and_then(|v| v.to_str().ok()) {
        if !header.is_empty() {
            return Some(header.to_string());
        }
    }
    geoip_country()
}

fn resolve_lat_lon(
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    geoip_lat_lon: impl FnOnce() -> Option<(f64, f64)>,
) -> Result<Option<(f64, f64)>, AppError> {
    if let (Some(lat), Some(lon)) = (query.get("lat"), query.get("lon")) {
        let lat: f64 = lat
            .parse()
            .map_err(|_| AppError::BadParameter(format!("lat is not a number: {lat:?}")))?;
        let lon: f64 = lon
            .parse()
            .map_err(|_| AppError::BadParameter(format!("lon is not a number: {lon:?}")))?;
        return Ok(Some((lat, lon)));
    }

    if let Some(header) = headers.get("X-AppEngine-CityLatLong").and_then(|v| v.to_str().ok()) {
        if header != APPENGINE_LATLONG_SENTINEL {
            if let Some((lat, lon)) = header.split_once(',') {
                let lat: f64 = lat
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadParameter("malformed X-AppEngine-CityLatLong header".to_string()))?;
                let lon: f64 = lon
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadParameter("malformed X-AppEngine-CityLatLong header".to_string()))?;
                return Ok(Some((lat, lon)));
            }
        }
    }

    Ok(geoip_lat_lon())
}

pub async fn lookup(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Pretty<LookupResponse>, AppError> {
    let source_ip = match query.get("ipv4") {
        Some(explicit) => explicit
            .parse::<IpAddr>()
            .map_err(|_| AppError::BadParameter(format!("ipv4 is not a valid IP: {explicit:?}")))?,
        None => remote.ip(),
    };

    let geo = state.geoip.city(source_ip);

    let country = resolve_country(&query, &headers, || geo.as_ref().ok().map(|g| g.country.clone()))
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadParameter("could not determine caller's country".to_string()))?;

    let lat_lon = resolve_lat_lon(&query, &headers, || {
        geo.as_ref().ok().map(|g| (g.latitude, g.longitude))
    })?;

    let (lat, lon) = lat_lon
        .ok_or_else(|| AppError::BadParameter("could not determine caller's latitude/longitude".to_string()))?;

    let iata = state.iata.lookup(&country, lat, lon).map_err(AppError::IataFind)?;

    Ok(Pretty(LookupResponse {
        lookup: LookupBody { iata },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_latlong_header_is_treated_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("X-AppEngine-CityLatLong", APPENGINE_LATLONG_SENTINEL.parse().unwrap());
        let query = HashMap::new();
        let result = resolve_lat_lon(&query, &headers, || None).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn explicit_query_country_wins_over_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-AppEngine-Country", "FR".parse().unwrap());
        let mut query = HashMap::new();
        query.insert("country".to_string(), "US".to_string());
        let country = resolve_country(&query, &headers, || None);
        assert_eq!(country, Some("US".to_string()));
    }

    #[test]
    fn header_latlong_used_when_not_sentinel() {
        let mut headers = HeaderMap::new();
        headers.insert("X-AppEngine-CityLatLong", "43,-73".parse().unwrap());
        let query = HashMap::new();
        let result = resolve_lat_lon(&query, &headers, || None).unwrap();
        assert_eq!(result, Some((43.0, -73.0)));
    }
}
