#[macro_use]
extern crate tracing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use autojoin::asn::RouteviewAsn;
use autojoin::config::{Cli, Command, ServeArgs};
use autojoin::dns::google::GoogleCloudDnsProvider;
use autojoin::geoip::MaxMindGeoIp;
use autojoin::http::build_router;
use autojoin::http::state::AppState;
use autojoin::iata::RemoteIataTable;
use autojoin::metrics::TracingMetrics;
use autojoin::reload::start_reload_loop;
use autojoin::store::{InMemoryCredentialStore, InMemoryKeyStore, RedisLivenessStore};
use autojoin::tracker::LivenessTracker;

fn initialize_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    let iata = Arc::new(RemoteIataTable::new(args.iata_url.clone()));
    let geoip = Arc::new(MaxMindGeoIp::new(args.geoip_url.clone()));
    let asn = Arc::new(RouteviewAsn::new(args.routeview_url.clone()));

    iata.load().await.context("initial IATA table load failed")?;
    geoip.reload().await.context("initial GeoIP snapshot load failed")?;
    asn.reload().await.context("initial ASN table load failed")?;

    let http_client = reqwest::Client::new();
    let dns_provider = Arc::new(GoogleCloudDnsProvider::new(args.dns_api_base.clone(), http_client));

    let liveness_store = Arc::new(
        RedisLivenessStore::connect(&args.liveness_store_addr, "autojoin")
            .await
            .context("failed to connect to the liveness store")?,
    );

    let metrics = Arc::new(TracingMetrics);

    let tracker = LivenessTracker::start(
        liveness_store,
        dns_provider.clone(),
        metrics.clone(),
        args.project.clone(),
        args.gc_ttl(),
        args.gc_interval(),
    );

    let reload_cancel = CancellationToken::new();
    let reload_task = start_reload_loop(iata.clone(), geoip.clone(), asn.clone(), reload_cancel.clone());

    let min_version = args
        .min_version
        .parse()
        .with_context(|| format!("invalid --min-version {:?}", args.min_version))?;

    // Key/credential stores are owned by an external provisioning system;
    // this crate owns only the adapter interface. A production deployment
    // substitutes real clients for the key-value org store and the
    // credential-minting service here.
    let state = AppState {
        iata,
        geoip,
        asn,
        key_store: Arc::new(InMemoryKeyStore::default()),
        credential_store: Arc::new(InMemoryCredentialStore::default()),
        dns_provider,
        tracker,
        metrics,
        project: args.project.clone(),
        min_version,
    };

    let router = build_router(state);
    let addr = SocketAddr::from((args.interface, args.port));
    info!("autojoin listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server exited with an error")?;

    reload_cancel.cancel();
    reload_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}
