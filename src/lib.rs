#[macro_use]
extern crate tracing;

pub mod asn;
pub mod config;
pub mod dns;
pub mod error;
pub mod geoip;
pub mod http;
pub mod iata;
pub mod metrics;
pub mod naming;
pub mod registration;
pub mod reload;
pub mod store;
#[cfg(feature = "testing")]
pub mod testing;
pub mod tracker;
