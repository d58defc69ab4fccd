//! Autonomous-system annotation over a routeview-style prefix table: maps an
//! IPv4 address to `{asn, prefix}`. Same atomic-swap discipline as the IATA
//! table and GeoIP resolver.

use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRecord {
    pub asn: u32,
    pub prefix: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AsnError {
    #[error("no route found for {0}")]
    NotFound(Ipv4Addr),
    #[error("failed to fetch or parse routeview data: {0}")]
    Load(String),
}

#[async_trait]
pub trait AsnAnnotator: Send + Sync {
    async fn reload(&self) -> Result<(), AsnError>;
    fn annotate(&self, ip: Ipv4Addr) -> Result<NetworkRecord, AsnError>;
}

/// A single routed prefix: `base` and `prefix_len` describe a CIDR block,
/// `asn` is the originating AS.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Prefix {
    base: u32,
    prefix_len: u32,
    asn: u32,
}

impl Prefix {
    fn contains(&self, addr: u32) -> bool {
        if self.prefix_len == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - self.prefix_len);
        (addr & mask) == (self.base & mask)
    }

    fn to_cidr_string(self) -> String {
        format!("{}/{}", Ipv4Addr::from(self.base), self.prefix_len)
    }
}

fn parse_prefixes(source: &str) -> Vec<Prefix> {
    let mut prefixes = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // routeview format: "<cidr>,<asn>"
        let mut fields = line.split(',');
        let cidr = fields.next();
        let asn = fields.next();
        match (cidr, asn) {
            (Some(cidr), Some(asn)) => match (parse_cidr(cidr.trim()), asn.trim().parse::<u32>()) {
                (Some((base, prefix_len)), Ok(asn)) => prefixes.push(Prefix { base, prefix_len, asn }),
                _ => warn!(line = line_no, "skipping malformed routeview row: {}", line),
            },
            _ => warn!(line = line_no, "skipping malformed routeview row: {}", line),
        }
    }
    // Longest-prefix-match first.
    prefixes.sort_by(|a, b| b.prefix_len.cmp(&a.prefix_len));
    prefixes
}

fn parse_cidr(s: &str) -> Option<(u32, u32)> {
    let (addr, len) = s.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let len: u32 = len.parse().ok()?;
    if len > 32 {
        return None;
    }
    Some((u32::from(addr), len))
}

async fn fetch_source(url: &str) -> Result<String, AsnError> {
    if let Some(path) = url.strip_prefix("file://") {
        return tokio::fs::read_to_string(path).await.map_err(|e| AsnError::Load(e.to_string()));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return reqwest::get(url)
            .await
            .map_err(|e| AsnError::Load(e.to_string()))?
            .error_for_status()
            .map_err(|e| AsnError::Load(e.to_string()))?
            .text()
            .await
            .map_err(|e| AsnError::Load(e.to_string()));
    }
    tokio::fs::read_to_string(url).await.map_err(|e| AsnError::Load(e.to_string()))
}

pub struct RouteviewAsn {
    source_url: String,
    prefixes: ArcSwap<Vec<Prefix>>,
}

impl RouteviewAsn {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            prefixes: ArcSwap::from(Arc::new(Vec::new())),
        }
    }
}

#[async_trait]
impl AsnAnnotator for RouteviewAsn {
    async fn reload(&self) -> Result<(), AsnError> {
        let source = fetch_source(&self.source_url).await?;
        let prefixes = parse_prefixes(&source);
        self.prefixes.store(Arc::new(prefixes));
        Ok(())
    }

    fn annotate(&self, ip: Ipv4Addr) -> Result<NetworkRecord, AsnError> {
        let addr = u32::from(ip);
        self.prefixes
            .load()
            .iter()
            .find(|p| p.contains(addr))
            .map(|p| NetworkRecord {
                asn: p.asn,
                prefix: p.to_cidr_string(),
            })
            .ok_or(AsnError::NotFound(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_match_wins() {
        let prefixes = parse_prefixes("192.168.0.0/16,100\n192.168.0.0/24,200\n");
        let table = RouteviewAsn {
            source_url: String::new(),
            prefixes: ArcSwap::from(Arc::new(prefixes)),
        };
        let record = table.annotate(Ipv4Addr::new(192, 168, 0, 1)).unwrap();
        assert_eq!(record.asn, 200);
    }

    #[test]
    fn unrouted_address_is_not_found() {
        let prefixes = parse_prefixes("10.0.0.0/8,64512\n");
        let table = RouteviewAsn {
            source_url: String::new(),
            prefixes: ArcSwap::from(Arc::new(prefixes)),
        };
        assert!(table.annotate(Ipv4Addr::new(8, 8, 8, 8)).is_err());
    }
}
