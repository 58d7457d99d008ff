use anyhow::{bail, Context, Result};
use ev_ingestion_service::{
    config::AppConfig, observability, store::PostgresTelemetryStore, AnalyticsAggregator,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: vehicle_performance <vehicle_id> [window_hours]");
    }
    let vehicle_id = &args[1];

    let cfg = AppConfig::load()?;

    let window = match args.get(2) {
        Some(raw) => {
            let hours: i64 = raw
                .parse()
                .with_context(|| format!("invalid window_hours '{raw}'"))?;
            let secs = hours
                .checked_mul(3600)
                .with_context(|| format!("window_hours {hours} is out of range"))?;
            time::Duration::seconds(secs)
        }
        None => cfg.analytics_window(),
    };

    let store = PostgresTelemetryStore::connect(cfg.postgres()?).await?;
    let perf = AnalyticsAggregator::new(Arc::new(store))
        .vehicle_performance_over(vehicle_id, window)
        .await?;

    tracing::info!(
        vehicle_id = %perf.vehicle_id,
        total_samples = perf.total_samples,
        efficiency_ratio = perf.efficiency_ratio,
        "vehicle performance computed"
    );
    println!("{}", serde_json::to_string_pretty(&perf)?);

    Ok(())
}
