//! The liveness tracker and its reconciliation loop. A shared singleton:
//! `update`/`delete`/`list` are called concurrently from request handlers
//! while a single background task sweeps for expired entries on a fixed
//! interval. The sweep uses an explicit stop signal rather than relying on
//! `JoinHandle::abort()`, since this loop must finish an in-flight DNS call
//! cleanly before exiting.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::dns::{DnsManager, DnsProvider};
use crate::metrics::Metrics;
use crate::naming::{org_zone, parse_hostname};
use crate::store::{LivenessEntry, LivenessStore, StoreError};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

pub struct LivenessTracker {
    store: Arc<dyn LivenessStore>,
    dns_provider: Arc<dyn DnsProvider>,
    metrics: Arc<dyn Metrics>,
    project: String,
    ttl: Duration,
    cancel: CancellationToken,
    gc_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LivenessTracker {
    /// Constructs the tracker and starts its single reconciliation loop.
    pub fn start(
        store: Arc<dyn LivenessStore>,
        dns_provider: Arc<dyn DnsProvider>,
        metrics: Arc<dyn Metrics>,
        project: impl Into<String>,
        ttl: Duration,
        interval: Duration,
    ) -> Arc<Self> {
        let tracker = Arc::new(Self {
            store,
            dns_provider,
            metrics,
            project: project.into(),
            ttl,
            cancel: CancellationToken::new(),
            gc_task: tokio::sync::Mutex::new(None),
        });

        let loop_tracker = tracker.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_tracker.cancel.cancelled() => {
                        debug!("liveness tracker reconciliation loop stopping");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(error) = loop_tracker.check_and_remove_expired().await {
                            warn!("reconciliation pass failed: {}", error);
                        }
                    }
                }
            }
        });

        // Best-effort: the mutex is only ever locked here and in `stop`.
        if let Ok(mut guard) = tracker.gc_task.try_lock() {
            *guard = Some(handle);
        }

        tracker
    }

    pub async fn update(&self, hostname: &str, ports: Vec<String>) -> Result<(), StoreError> {
        self.store
            .put(
                hostname,
                LivenessEntry {
                    last_refresh: now_unix(),
                    ports,
                },
            )
            .await
    }

    pub async fn delete(&self, hostname: &str) -> Result<(), StoreError> {
        self.store.del(hostname).await
    }

    /// Triggers one reconciliation pass and returns the live entries.
    pub async fn list(&self) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
        self.check_and_remove_expired().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[instrument(skip(self))]
    async fn check_and_remove_expired(&self) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
        let entries = match self.store.get_all().await {
            Ok(entries) => entries,
            Err(error) => {
                self.metrics.counter("tracker_gc", &[("result", "enumerate_failed")]);
                return Err(error);
            }
        };

        let now = now_unix();
        let mut live_hosts = Vec::with_capacity(entries.len());
        let mut live_ports = Vec::with_capacity(entries.len());

        for (hostname, entry) in entries {
            let deadline = entry.last_refresh + self.ttl.as_secs() as i64;
            self.metrics.gauge(
                "autojoin_liveness_deadline_seconds",
                deadline as f64,
                &[("hostname", hostname.as_str())],
            );

            if now > deadline {
                self.expire_one(&hostname).await;
            } else {
                live_hosts.push(hostname);
                live_ports.push(entry.ports);
            }
        }

        Ok((live_hosts, live_ports))
    }

    async fn expire_one(&self, hostname: &str) {
        let parts = match parse_hostname(hostname) {
            Ok(parts) => parts,
            Err(error) => {
                warn!("could not parse expired hostname {:?}: {}", hostname, error);
                self.metrics.counter("tracker_gc", &[("result", "parse_failed")]);
                return;
            }
        };

        let zone = org_zone(&parts.org, &self.project);
        let manager = DnsManager::new(self.project.clone(), zone, self.dns_provider.clone());
        let fqdn = format!("{hostname}.");

        match manager.delete(&fqdn).await {
            Ok(_) => {
                // Only remove the store entry once DNS deletion has
                // succeeded: a failed delete here is the only source of
                // retry in the design, and it works by simply leaving the
                // entry in place for the next pass.
                match self.store.del(hostname).await {
                    Ok(()) => self.metrics.counter("memorystore_delete", &[("result", "success")]),
                    Err(error) => {
                        error!("DNS delete succeeded but store delete failed for {}: {}", hostname, error);
                        self.metrics.counter("memorystore_delete", &[("result", "failed")]);
                    }
                }
            }
            Err(error) => {
                warn!("DNS delete failed for {}, retrying next pass: {}", hostname, error);
                self.metrics.counter("dns_delete", &[("result", "failed")]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use crate::store::InMemoryLivenessStore;
    use crate::testing::FakeDnsProvider;

    fn tracker_without_loop(
        store: Arc<InMemoryLivenessStore>,
        dns: Arc<FakeDnsProvider>,
        ttl: Duration,
    ) -> LivenessTracker {
        LivenessTracker {
            store,
            dns_provider: dns,
            metrics: Arc::new(NoopMetrics),
            project: "mlab-sandbox".to_string(),
            ttl,
            cancel: CancellationToken::new(),
            gc_task: tokio::sync::Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn update_then_list_reports_the_host() {
        let store = Arc::new(InMemoryLivenessStore::default());
        let dns = Arc::new(FakeDnsProvider::default());
        let tracker = tracker_without_loop(store, dns, Duration::from_secs(3 * 3600));

        tracker
            .update("ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org", vec![])
            .await
            .unwrap();

        let (hosts, _) = tracker.list().await.unwrap();
        assert_eq!(hosts, vec!["ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org".to_string()]);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_after_successful_dns_delete() {
        let store = Arc::new(InMemoryLivenessStore::default());
        let dns = Arc::new(FakeDnsProvider::default());
        let tracker = tracker_without_loop(store.clone(), dns, Duration::from_secs(3 * 3600));

        store
            .put(
                "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org",
                LivenessEntry { last_refresh: 0, ports: vec![] },
            )
            .await
            .unwrap();

        let (hosts, _) = tracker.list().await.unwrap();
        assert!(hosts.is_empty());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dns_delete_failure_leaves_store_entry_for_retry() {
        let store = Arc::new(InMemoryLivenessStore::default());
        let dns = Arc::new(FakeDnsProvider::failing_deletes());
        let tracker = tracker_without_loop(store.clone(), dns, Duration::from_secs(3 * 3600));

        store
            .put(
                "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org",
                LivenessEntry { last_refresh: 0, ports: vec![] },
            )
            .await
            .unwrap();

        let (hosts, _) = tracker.list().await.unwrap();
        assert!(hosts.is_empty(), "expired host should not be reported as live");
        assert_eq!(store.get_all().await.unwrap().len(), 1, "entry must survive a failed DNS delete");
    }

    #[tokio::test]
    async fn update_twice_then_list_yields_latest_ports() {
        let store = Arc::new(InMemoryLivenessStore::default());
        let dns = Arc::new(FakeDnsProvider::default());
        let tracker = tracker_without_loop(store, dns, Duration::from_secs(3 * 3600));

        let host = "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org";
        tracker.update(host, vec!["8080".to_string()]).await.unwrap();
        tracker.update(host, vec!["9090".to_string()]).await.unwrap();

        let (hosts, ports) = tracker.list().await.unwrap();
        assert_eq!(hosts, vec![host.to_string()]);
        assert_eq!(ports, vec![vec!["9090".to_string()]]);
    }
}
