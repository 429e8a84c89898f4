use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics exporter.
/// Returns a handle that can be used to render metrics for scraping.
pub fn init_metrics() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                // Webhook processing time buckets: 1ms .. 10s
                .set_buckets_for_metric(
                    metrics_exporter_prometheus::Matcher::Full(
                        "stripe_webhook_processing_ms".to_string(),
                    ),
                    &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0],
                )
                .expect("failed to set buckets for stripe_webhook_processing_ms")
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Render current metrics in the Prometheus exposition format
pub async fn render_metrics() -> String {
    match METRICS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}
