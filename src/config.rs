//! CLI surface and environment configuration: a `clap::Parser` with one
//! `Serve` subcommand, every flag mirrored by an environment-variable
//! default.

use std::net::IpAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

#[derive(Debug, Parser)]
#[clap(name = "autojoin")]
#[clap(about = "Dynamic node-registration service for a distributed measurement platform", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the registration service and serve clients.
    Serve(ServeArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The IP address of the interface to bind to.
    #[clap(long, env = "HOST", default_value = "0.0.0.0")]
    pub interface: IpAddr,

    /// The port to listen on.
    #[clap(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// GCP project id that owns the DNS zones this service manages.
    #[clap(long, env = "AUTOJOIN_PROJECT")]
    pub project: String,

    /// Source of the IATA airport table (file path, `file://`, or `http(s)://`).
    #[clap(long, env = "AUTOJOIN_IATA_URL")]
    pub iata_url: String,

    /// Source of the MaxMind City GeoIP database.
    #[clap(long, env = "AUTOJOIN_GEOIP_URL")]
    pub geoip_url: String,

    /// Source of the routeview ASN prefix table.
    #[clap(long, env = "AUTOJOIN_ROUTEVIEW_URL")]
    pub routeview_url: String,

    /// Address of the liveness KV store (a `redis://` URL).
    #[clap(long, env = "AUTOJOIN_LIVENESS_STORE_ADDR")]
    pub liveness_store_addr: String,

    /// Base URL of the authoritative DNS provider API.
    #[clap(long, env = "AUTOJOIN_DNS_API_BASE")]
    pub dns_api_base: Url,

    /// How long a liveness entry may go unrefreshed before it is expired.
    #[clap(long, env = "AUTOJOIN_GC_TTL_SECONDS", default_value_t = 3 * 3600)]
    pub gc_ttl_seconds: u64,

    /// How often the garbage collector sweeps for expired entries.
    #[clap(long, env = "AUTOJOIN_GC_INTERVAL_SECONDS", default_value_t = 30 * 60)]
    pub gc_interval_seconds: u64,

    /// The minimum client version accepted by the registration endpoint.
    #[clap(long, env = "AUTOJOIN_MIN_VERSION", default_value = "0.0.0")]
    pub min_version: String,
}

impl ServeArgs {
    pub fn gc_ttl(&self) -> Duration {
        Duration::from_secs(self.gc_ttl_seconds)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_seconds)
    }
}
