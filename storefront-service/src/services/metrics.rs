use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::{Once, OnceLock};

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ORDERS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENT_CALLBACKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DB_QUERY_DURATION: OnceLock<HistogramVec> = OnceLock::new();

static INIT: Once = Once::new();

/// Installs the HTTP metrics recorder and registers the storefront
/// counters. Safe to call more than once per process.
pub fn init_metrics() {
    INIT.call_once(|| {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus recorder already installed");
            }
        }

        let registry = Registry::new();

        // Placed orders by requested payment method ("manual" when none)
        let orders_counter = IntCounterVec::new(
            Opts::new("storefront_orders_total", "Total orders placed by payment method"),
            &["payment_method"],
        )
        .expect("Failed to create storefront_orders_total metric");

        // Verified gateway callbacks by what reconciliation did with them
        let callbacks_counter = IntCounterVec::new(
            Opts::new(
                "storefront_payment_callbacks_total",
                "Total payment gateway callbacks by gateway and outcome",
            ),
            &["gateway", "outcome"],
        )
        .expect("Failed to create storefront_payment_callbacks_total metric");

        let db_histogram = HistogramVec::new(
            HistogramOpts::new(
                "storefront_db_query_duration_seconds",
                "Database query duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["operation"],
        )
        .expect("Failed to create storefront_db_query_duration_seconds metric");

        registry
            .register(Box::new(orders_counter.clone()))
            .expect("Failed to register storefront_orders_total");
        registry
            .register(Box::new(callbacks_counter.clone()))
            .expect("Failed to register storefront_payment_callbacks_total");
        registry
            .register(Box::new(db_histogram.clone()))
            .expect("Failed to register storefront_db_query_duration_seconds");

        let _ = PROMETHEUS_REGISTRY.set(registry);
        let _ = ORDERS_TOTAL.set(orders_counter);
        let _ = PAYMENT_CALLBACKS_TOTAL.set(callbacks_counter);
        let _ = DB_QUERY_DURATION.set(db_histogram);
    });
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_order(payment_method: &str) {
    if let Some(counter) = ORDERS_TOTAL.get() {
        counter.with_label_values(&[payment_method]).inc();
    }
}

pub fn record_callback(gateway: &str, outcome: &str) {
    if let Some(counter) = PAYMENT_CALLBACKS_TOTAL.get() {
        counter.with_label_values(&[gateway, outcome]).inc();
    }
}

/// Times a store operation; the sample is recorded when the guard drops.
pub fn db_timer(operation: &str) -> Option<prometheus::HistogramTimer> {
    DB_QUERY_DURATION
        .get()
        .map(|h| h.with_label_values(&[operation]).start_timer())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render_after_init() {
        init_metrics();
        init_metrics();
        record_order("payos");
        record_callback("vnpay", "applied");

        let text = get_metrics();
        assert!(text.contains("storefront_orders_total"));
        assert!(text.contains("storefront_payment_callbacks_total"));
    }
}
