//! A small metrics trait the core owns and calls directly, independent of
//! whatever scrapes it. Wiring an actual Prometheus endpoint is out of
//! scope; the core still needs somewhere to classify and count the events
//! the registration and reconciliation paths call out ("emit a metric",
//! "emit a classified metric").

use tracing::info;

pub trait Metrics: Send + Sync {
    fn counter(&self, name: &str, labels: &[(&str, &str)]);
    fn gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// Logs each counter/gauge event at `info` level through `tracing`, for
/// deployments without a metrics backend of their own.
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn counter(&self, name: &str, labels: &[(&str, &str)]) {
        info!(metric = name, ?labels, "counter incremented");
    }

    fn gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        info!(metric = name, value, ?labels, "gauge observed");
    }
}

pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}
