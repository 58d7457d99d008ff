//! Prometheus exposition for ingestion and analytics metrics.

use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// One ingestion transaction normally completes in a few milliseconds; the
/// upper buckets catch pool exhaustion and slow commits.
const INGEST_LATENCY_BUCKETS: &[f64] = &[0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ingest_transaction_seconds".to_string()),
            INGEST_LATENCY_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid ingest latency buckets: {e}"))
}

fn describe_metrics() {
    metrics::describe_counter!("http_ingest_requests_total", "POST /v1/ingest requests received");
    metrics::describe_counter!("telemetry_ingested_total", "samples committed, by kind");
    metrics::describe_counter!("telemetry_ingest_failed_total", "ingestion calls that failed, by reason");
    metrics::describe_counter!("telemetry_unmapped_meter_total", "meter samples stored without a vehicle");
    metrics::describe_counter!("validation_payload_rejected_total", "payloads rejected by validation, by kind");
    metrics::describe_counter!("analytics_requests_total", "vehicle performance aggregations, by outcome");
    metrics::describe_histogram!(
        "ingest_transaction_seconds",
        Unit::Seconds,
        "wall time of one ingestion transaction"
    );
}

/// Install the Prometheus recorder and serve `/metrics` on `bind_addr`.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics.bind_addr '{bind_addr}': {e}"))?;

    let handle = builder()?
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}"))?;
    if PROM_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics recorder already installed");
    }
    describe_metrics();

    let listener = std::net::TcpListener::bind(addr)
        .map_err(|e| anyhow::anyhow!("failed to bind metrics listener on {addr}: {e}"))?;
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    tracing::info!(%addr, "serving Prometheus metrics");

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(render));
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

async fn render() -> String {
    PROM_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}
