//! Shared request-parameter validation for the `register` handler.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderMap;
use patterns::*;

use crate::error::AppError;

/// Lazily-compiled regexes, following the pattern of compiling once and
/// reusing across requests rather than rebuilding per call.
mod patterns {
    use regex::Regex;
    use std::sync::OnceLock;

    pub fn service_name_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap())
    }

    pub fn uplink_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^[0-9]+g$").unwrap())
    }

    pub fn iata_code_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^[a-z0-9]{3}$").unwrap())
    }
}

/// `service` and other bare names: `[a-zA-Z0-9]+`, length <= 10.
pub fn validate_name(field: &str, value: &str) -> Result<(), AppError> {
    if value.len() > 10 || !service_name_re().is_match(value) {
        return Err(AppError::BadParameter(format!(
            "{field} must match [a-zA-Z0-9]+ and be at most 10 characters, got {value:?}"
        )));
    }
    Ok(())
}

pub fn validate_node_type(value: &str) -> Result<(), AppError> {
    if value != "physical" && value != "virtual" {
        return Err(AppError::BadParameter(format!(
            "type must be \"physical\" or \"virtual\", got {value:?}"
        )));
    }
    Ok(())
}

pub fn validate_uplink(value: &str) -> Result<(), AppError> {
    if !uplink_re().is_match(value) {
        return Err(AppError::BadParameter(format!(
            "uplink must match [0-9]+g, got {value:?}"
        )));
    }
    Ok(())
}

/// Three lowercase alphanumerics; existence in the table is checked
/// separately by the caller via `IataTable::find`.
pub fn validate_iata_code_shape(value: &str) -> Result<(), AppError> {
    if !iata_code_re().is_match(value) {
        return Err(AppError::BadParameter(format!(
            "iata must be three lowercase alphanumerics, got {value:?}"
        )));
    }
    Ok(())
}

pub fn parse_version(raw: Option<&str>) -> Result<semver::Version, AppError> {
    let raw = raw.unwrap_or("v0.0.0");
    let trimmed = raw.strip_prefix('v').unwrap_or(raw);
    semver::Version::parse(trimmed).map_err(|e| AppError::VersionInvalid(e.to_string()))
}

/// Resolves the caller's IPv4 address: explicit `ipv4` query param, else the
/// first entry of `X-Forwarded-For`, else the TCP peer address.
pub fn resolve_ipv4(
    explicit: Option<&str>,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> Result<Ipv4Addr, AppError> {
    if let Some(explicit) = explicit {
        return explicit
            .parse()
            .map_err(|_| AppError::BadParameter(format!("ipv4 is not a valid IPv4 address: {explicit:?}")));
    }

    if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(IpAddr::V4(addr)) = first.trim().parse::<IpAddr>() {
                return Ok(addr);
            }
        }
    }

    match remote {
        Some(SocketAddr::V4(addr)) => Ok(*addr.ip()),
        _ => Err(AppError::BadParameter("could not determine caller's IPv4 address".to_string())),
    }
}

pub fn parse_optional_ipv6(explicit: Option<&str>) -> Result<Option<std::net::Ipv6Addr>, AppError> {
    match explicit {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadParameter(format!("ipv6 is not a valid address: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_rejects_overlong_or_symbol_bearing_values() {
        assert!(validate_name("service", "ndt").is_ok());
        assert!(validate_name("service", "this-is-too-long").is_err());
        assert!(validate_name("service", "has space").is_err());
    }

    #[test]
    fn uplink_requires_digits_then_g() {
        assert!(validate_uplink("1g").is_ok());
        assert!(validate_uplink("10g").is_ok());
        assert!(validate_uplink("1gb").is_err());
        assert!(validate_uplink("g").is_err());
    }

    #[test]
    fn version_defaults_and_strips_v_prefix() {
        assert_eq!(parse_version(None).unwrap(), semver::Version::new(0, 0, 0));
        assert_eq!(parse_version(Some("v1.2.3")).unwrap(), semver::Version::new(1, 2, 3));
        assert!(parse_version(Some("not-a-version")).is_err());
    }

    #[test]
    fn resolves_ipv4_from_forwarded_header_when_no_explicit_value() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "203.0.113.5, 10.0.0.1".parse().unwrap());
        let ip = resolve_ipv4(None, &headers, None).unwrap();
        assert_eq!(ip, "203.0.113.5".parse::<Ipv4Addr>().unwrap());
    }
}
