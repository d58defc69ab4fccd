//! End-to-end scenarios against a real `axum::serve` instance on a loopback
//! port, exercised with `reqwest`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use autojoin::asn::NetworkRecord;
use autojoin::dns::DnsManager;
use autojoin::geoip::{GeoError, GeoIpResolver, GeoRecord};
use autojoin::http::build_router;
use autojoin::http::state::AppState;
use autojoin::iata::{IataRow, RemoteIataTable};
use autojoin::metrics::NoopMetrics;
use autojoin::store::{InMemoryCredentialStore, InMemoryKeyStore, InMemoryLivenessStore};
use autojoin::testing::{FakeDnsProvider, StaticAsnAnnotator, StaticGeoIpResolver};
use autojoin::tracker::LivenessTracker;

const PROJECT: &str = "mlab-sandbox";

/// A `GeoIpResolver` that always fails, for exercising the caller-location
/// branches that only run once GeoIP can't fill in for a missing query/header.
struct UnresolvedGeoIp;

#[async_trait::async_trait]
impl GeoIpResolver for UnresolvedGeoIp {
    async fn reload(&self) -> Result<(), GeoError> {
        Ok(())
    }

    fn city(&self, ip: std::net::IpAddr) -> Result<GeoRecord, GeoError> {
        Err(GeoError::NotFound(ip))
    }
}

async fn spawn_server() -> (SocketAddr, Arc<FakeDnsProvider>, reqwest::Client) {
    let geoip = Arc::new(StaticGeoIpResolver(GeoRecord {
        country: "US".to_string(),
        country_name: "United States".to_string(),
        continent: "NA".to_string(),
        city: "New York".to_string(),
        postal: "10001".to_string(),
        metro_code: "501".to_string(),
        ..Default::default()
    }));
    spawn_server_with_geoip(geoip).await
}

async fn spawn_server_with_geoip(
    geoip: Arc<dyn GeoIpResolver>,
) -> (SocketAddr, Arc<FakeDnsProvider>, reqwest::Client) {
    let iata = Arc::new(RemoteIataTable::from_rows(vec![IataRow {
        code: "lga".to_string(),
        country: "US".to_string(),
        lat: 40.7769,
        lon: -73.8740,
    }]));
    let asn = Arc::new(StaticAsnAnnotator(NetworkRecord {
        asn: 12345,
        prefix: "192.168.0.0/16".to_string(),
    }));
    let dns_provider = Arc::new(FakeDnsProvider::default());
    let liveness_store = Arc::new(InMemoryLivenessStore::default());
    let metrics = Arc::new(NoopMetrics);

    let tracker = LivenessTracker::start(
        liveness_store,
        dns_provider.clone(),
        metrics.clone(),
        PROJECT,
        Duration::from_secs(3 * 3600),
        Duration::from_secs(3600),
    );

    let key_store = Arc::new(
        InMemoryKeyStore::new()
            .with_key("good-key", "bar")
            .with_key("other-key", "baz"),
    );
    let credential_store = Arc::new(InMemoryCredentialStore::default());

    let state = AppState {
        iata,
        geoip,
        asn,
        key_store,
        credential_store,
        dns_provider: dns_provider.clone(),
        tracker,
        metrics,
        project: PROJECT.to_string(),
        min_version: "0.0.0".parse().unwrap(),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    (addr, dns_provider, reqwest::Client::new())
}

fn register_url(addr: SocketAddr, key: &str) -> String {
    format!(
        "http://{addr}/v0/node/register?key={key}&service=ndt&type=physical&uplink=1g&iata=lga&ipv4=192.168.0.1"
    )
}

#[tokio::test]
async fn fresh_registration_returns_synthesized_response() {
    let (addr, _dns, client) = spawn_server().await;

    let resp = client.post(register_url(addr, "good-key")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["hostname"],
        "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org"
    );
    assert_eq!(body["annotation"]["geo"]["country"], "US");
    assert!(body["credentials"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn register_with_invalid_key_is_unauthorized() {
    let (addr, _dns, client) = spawn_server().await;

    let resp = client.post(register_url(addr, "wrong-key")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_list_then_delete_round_trip() {
    let (addr, dns, client) = spawn_server().await;

    client.post(register_url(addr, "good-key")).send().await.unwrap();

    let list_resp = client
        .get(format!("http://{addr}/v0/node/list"))
        .send()
        .await
        .unwrap();
    assert_eq!(list_resp.status(), reqwest::StatusCode::OK);
    assert_eq!(
        list_resp.headers().get("cache-control").unwrap(),
        "no-store"
    );
    let hosts: Vec<String> = list_resp.json().await.unwrap();
    assert_eq!(hosts, vec!["ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org".to_string()]);

    let delete_resp = client
        .post(format!(
            "http://{addr}/v0/node/delete?key=good-key&hostname=ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), reqwest::StatusCode::OK);

    let list_after_delete: Vec<String> = client
        .get(format!("http://{addr}/v0/node/list"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list_after_delete.is_empty());

    // The DNS provider should no longer carry the A record either.
    let zone = "autojoin-bar-sandbox-measurement-lab-org";
    let manager = DnsManager::new(PROJECT, zone, dns.clone() as Arc<dyn autojoin::dns::DnsProvider>);
    let change = manager
        .register(
            "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org.",
            "192.168.0.1".parse().unwrap(),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(change, autojoin::dns::Change::Applied(_)), "a fresh A record should stage an addition after delete");
}

#[tokio::test]
async fn lookup_resolves_nearest_iata_from_query_lat_lon() {
    let (addr, _dns, client) = spawn_server().await;

    let resp = client
        .get(format!(
            "http://{addr}/v0/lookup?country=US&lat=40.78&lon=-73.88"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["lookup"]["iata"], "lga");
}

#[tokio::test]
async fn lookup_without_lat_lon_or_geoip_is_bad_request() {
    let (addr, _dns, client) = spawn_server_with_geoip(Arc::new(UnresolvedGeoIp)).await;

    let resp = client
        .get(format!("http://{addr}/v0/lookup?country=US"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_org_and_supports_prometheus_format() {
    let (addr, _dns, client) = spawn_server().await;

    client.post(register_url(addr, "good-key")).send().await.unwrap();
    client.post(register_url(addr, "other-key")).send().await.unwrap();

    let filtered: Vec<String> = client
        .get(format!("http://{addr}/v0/node/list?org=baz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered, vec!["ndt-lga12345-c0a80001.baz.sandbox.measurement-lab.org".to_string()]);

    let prometheus: Value = client
        .get(format!("http://{addr}/v0/node/list?org=bar&format=prometheus"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let groups = prometheus.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["labels"]["org"], "bar");
    assert_eq!(groups[0]["labels"]["deployment"], "byos");
    assert_eq!(groups[0]["targets"][0], "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org");

    let sites: Vec<String> = client
        .get(format!("http://{addr}/v0/node/list?format=sites"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sites, vec!["lga12345".to_string()]);
}

#[tokio::test]
async fn livez_and_readyz_report_health() {
    let (addr, _dns, client) = spawn_server().await;

    let live = client.get(format!("http://{addr}/livez")).send().await.unwrap();
    assert_eq!(live.status(), reqwest::StatusCode::OK);

    let ready = client.get(format!("http://{addr}/readyz")).send().await.unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::OK);
}
