//! The memoryless (truncated-exponential) dataset-reload ticker: sequential
//! `IATA.load`, `GeoIP.reload`, `ASN.reload` on a schedule with `Min=12h,
//! Max=72h, Expected=24h`. A reload error logs and is retried on the next
//! tick — no special handling beyond that.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::asn::AsnAnnotator;
use crate::geoip::GeoIpResolver;
use crate::iata::IataTable;

const MIN_INTERVAL: Duration = Duration::from_secs(12 * 3600);
const MAX_INTERVAL: Duration = Duration::from_secs(72 * 3600);
const EXPECTED_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Draws the next tick from an exponential distribution with the given
/// mean, truncated to `[min, max]`.
fn next_interval(rng: &mut impl Rng, min: Duration, max: Duration, expected: Duration) -> Duration {
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    let sample_secs = -expected.as_secs_f64() * u.ln();
    let clamped = sample_secs.clamp(min.as_secs_f64(), max.as_secs_f64());
    Duration::from_secs_f64(clamped)
}

pub fn start_reload_loop(
    iata: Arc<dyn IataTable>,
    geoip: Arc<dyn GeoIpResolver>,
    asn: Arc<dyn AsnAnnotator>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = rand::thread_rng();
        loop {
            let wait = next_interval(&mut rng, MIN_INTERVAL, MAX_INTERVAL, EXPECTED_INTERVAL);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dataset reload loop stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    reload_once(&*iata, &*geoip, &*asn).await;
                }
            }
        }
    })
}

async fn reload_once(iata: &dyn IataTable, geoip: &dyn GeoIpResolver, asn: &dyn AsnAnnotator) {
    if let Err(error) = iata.load().await {
        error!("IATA table reload failed, will retry next tick: {}", error);
    }
    if let Err(error) = geoip.reload().await {
        error!("GeoIP snapshot reload failed, will retry next tick: {}", error);
    }
    if let Err(error) = asn.reload().await {
        error!("ASN table reload failed, will retry next tick: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_interval_is_always_within_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let interval = next_interval(&mut rng, MIN_INTERVAL, MAX_INTERVAL, EXPECTED_INTERVAL);
            assert!(interval >= MIN_INTERVAL);
            assert!(interval <= MAX_INTERVAL);
        }
    }
}
