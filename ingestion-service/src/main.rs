use anyhow::Result;
use ev_ingestion_service::{
    config::{AppConfig, StorageKind},
    http_api::{self, AppState},
    metrics_server, observability,
    store::{InMemoryTelemetryStore, PostgresTelemetryStore, TelemetryStore},
    AnalyticsAggregator, IngestionCoordinator,
};
use std::{net::SocketAddr, sync::Arc};

fn build_router<S: TelemetryStore>(store: S, cfg: &AppConfig) -> axum::Router {
    let store = Arc::new(store);
    let state = AppState {
        ingestion: IngestionCoordinator::new(Arc::clone(&store))
            .with_timeout(cfg.server.ingest_timeout()),
        analytics: AnalyticsAggregator::new(store).with_window(cfg.analytics_window()),
    };
    http_api::router(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let app = match cfg.storage.kind {
        StorageKind::Postgres => {
            let store = PostgresTelemetryStore::connect(cfg.postgres()?).await?;
            build_router(store, &cfg)
        }
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; telemetry is lost on restart");
            let store = InMemoryTelemetryStore::with_mappings(cfg.storage.memory.mappings.clone());
            build_router(store, &cfg)
        }
    };

    let addr: SocketAddr = cfg
        .server
        .http_bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.http_bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, storage = ?cfg.storage.kind, "telemetry ingestion listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
