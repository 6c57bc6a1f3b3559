//! Metrics collection and Prometheus export.
//!
//! HTTP request metrics come from `service_core::middleware::metrics_middleware`;
//! the helpers below record storefront business events.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder. Later calls are no-ops, so tests may call it freely.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_order_created(payment_method: &'static str) {
    counter!("store_orders_created_total", "payment_method" => payment_method).increment(1);
}

pub fn record_inventory_operation(operation: &'static str, outcome: &'static str) {
    counter!(
        "store_inventory_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_webhook_event(event_type: &str, outcome: &'static str) {
    counter!(
        "store_webhook_events_total",
        "event_type" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_discount_job(outcome: &'static str) {
    counter!("store_discount_jobs_total", "outcome" => outcome).increment(1);
}
