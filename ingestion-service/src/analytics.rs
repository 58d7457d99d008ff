use std::sync::Arc;

use ev_telemetry_client::domain::VehiclePerformance;
use time::{Duration, OffsetDateTime};

use crate::store::{StorageError, TelemetryStore};

/// Trailing window used when the caller does not pick one.
pub const DEFAULT_WINDOW: Duration = Duration::hours(24);

#[derive(thiserror::Error, Debug)]
pub enum AnalyticsError {
    #[error("aggregation unavailable: {0}")]
    AggregationUnavailable(#[from] StorageError),
    #[error("analytics window must be positive and representable, got {0:?}")]
    InvalidWindow(Duration),
}

/// Read-only efficiency analytics over the cold tables.
pub struct AnalyticsAggregator<S> {
    store: Arc<S>,
    window: Duration,
}

impl<S> Clone for AnalyticsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            window: self.window,
        }
    }
}

impl<S: TelemetryStore> AnalyticsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Performance over the configured trailing window ending now.
    pub async fn vehicle_performance(&self, vehicle_id: &str) -> Result<VehiclePerformance, AnalyticsError> {
        self.vehicle_performance_over(vehicle_id, self.window).await
    }

    pub async fn vehicle_performance_over(
        &self,
        vehicle_id: &str,
        window: Duration,
    ) -> Result<VehiclePerformance, AnalyticsError> {
        self.vehicle_performance_as_of(vehicle_id, window, OffsetDateTime::now_utc())
            .await
    }

    /// Performance over `[now - window, ..)`. Samples stamped after `now` are
    /// still counted, matching an open-ended `timestamp >= start` scan.
    pub async fn vehicle_performance_as_of(
        &self,
        vehicle_id: &str,
        window: Duration,
        now: OffsetDateTime,
    ) -> Result<VehiclePerformance, AnalyticsError> {
        if !window.is_positive() {
            return Err(AnalyticsError::InvalidWindow(window));
        }
        let since = now
            .checked_sub(window)
            .ok_or(AnalyticsError::InvalidWindow(window))?;
        metrics::counter!("analytics_requests_total").increment(1);

        let totals = self
            .store
            .vehicle_window_totals(vehicle_id, since)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, vehicle_id, "vehicle window aggregation failed");
                AnalyticsError::AggregationUnavailable(e)
            })?;

        let perf = VehiclePerformance::from_totals(vehicle_id, totals);
        tracing::debug!(
            vehicle_id,
            total_samples = perf.total_samples,
            efficiency_ratio = perf.efficiency_ratio,
            "vehicle performance computed"
        );
        Ok(perf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ingest::IngestionCoordinator,
        payload::{MeterPayload, TelemetryPayload, VehiclePayload},
        store::InMemoryTelemetryStore,
    };
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

    fn vehicle(vehicle_id: &str, kwh: f64, temp: f64, ts: OffsetDateTime) -> TelemetryPayload {
        TelemetryPayload::Vehicle(VehiclePayload {
            vehicle_id: vehicle_id.to_string(),
            soc: 60.0,
            kwh_delivered_dc: kwh,
            battery_temp: temp,
            timestamp: ts,
        })
    }

    fn meter(meter_id: &str, kwh: f64, ts: OffsetDateTime) -> TelemetryPayload {
        TelemetryPayload::Meter(MeterPayload {
            meter_id: meter_id.to_string(),
            kwh_consumed_ac: kwh,
            voltage: 230.0,
            timestamp: ts,
        })
    }

    async fn seeded(payloads: Vec<TelemetryPayload>) -> AnalyticsAggregator<InMemoryTelemetryStore> {
        let store = Arc::new(InMemoryTelemetryStore::with_mappings([("m-1", "v-1")]));
        let coordinator = IngestionCoordinator::new(Arc::clone(&store));
        for p in payloads {
            coordinator.ingest(p).await.unwrap();
        }
        AnalyticsAggregator::new(store)
    }

    #[tokio::test]
    async fn aggregates_dc_and_ac_energy() {
        let analytics = seeded(vec![
            vehicle("v-1", 10.0, 30.0, NOW - Duration::hours(2)),
            vehicle("v-1", 5.0, 33.0, NOW - Duration::hours(1)),
            meter("m-1", 20.0, NOW - Duration::hours(1)),
        ])
        .await;

        let perf = analytics
            .vehicle_performance_as_of("v-1", DEFAULT_WINDOW, NOW)
            .await
            .unwrap();

        assert_eq!(perf.vehicle_id, "v-1");
        assert_eq!(perf.total_dc_kwh, 15.0);
        assert_eq!(perf.total_ac_kwh, 20.0);
        assert_eq!(perf.efficiency_ratio, 0.75);
        assert_eq!(perf.avg_battery_temp, 31.5);
        assert_eq!(perf.total_samples, 2);
    }

    #[tokio::test]
    async fn no_meter_rows_means_zero_ratio() {
        let analytics = seeded(vec![vehicle("v-1", 10.0, 30.0, NOW - Duration::hours(1))]).await;

        let perf = analytics
            .vehicle_performance_as_of("v-1", DEFAULT_WINDOW, NOW)
            .await
            .unwrap();

        assert_eq!(perf.total_ac_kwh, 0.0);
        assert_eq!(perf.efficiency_ratio, 0.0);
        assert!(perf.efficiency_ratio.is_finite());
        assert_eq!(perf.total_dc_kwh, 10.0);
    }

    #[tokio::test]
    async fn unknown_vehicle_yields_zeroes() {
        let analytics = seeded(vec![]).await;

        let perf = analytics.vehicle_performance("v-ghost").await.unwrap();

        assert_eq!(perf.total_samples, 0);
        assert_eq!(perf.total_dc_kwh, 0.0);
        assert_eq!(perf.avg_battery_temp, 0.0);
        assert_eq!(perf.efficiency_ratio, 0.0);
    }

    #[tokio::test]
    async fn window_start_boundary_is_respected() {
        let window_start = NOW - DEFAULT_WINDOW;
        let analytics = seeded(vec![
            vehicle("v-1", 100.0, 90.0, window_start - Duration::seconds(1)),
            vehicle("v-1", 4.0, 20.0, window_start + Duration::seconds(1)),
            meter("m-1", 50.0, window_start - Duration::seconds(1)),
            meter("m-1", 8.0, window_start + Duration::seconds(1)),
        ])
        .await;

        let perf = analytics
            .vehicle_performance_as_of("v-1", DEFAULT_WINDOW, NOW)
            .await
            .unwrap();

        assert_eq!(perf.total_samples, 1);
        assert_eq!(perf.total_dc_kwh, 4.0);
        assert_eq!(perf.avg_battery_temp, 20.0);
        assert_eq!(perf.total_ac_kwh, 8.0);
        assert_eq!(perf.efficiency_ratio, 0.5);
    }

    #[tokio::test]
    async fn ac_energy_follows_ingest_time_association() {
        let store = Arc::new(InMemoryTelemetryStore::with_mappings([("m-1", "v-1")]));
        let coordinator = IngestionCoordinator::new(Arc::clone(&store));
        coordinator
            .ingest(meter("m-1", 10.0, NOW - Duration::hours(3)))
            .await
            .unwrap();
        store.set_mapping("m-1", "v-2").await;
        coordinator
            .ingest(meter("m-1", 6.0, NOW - Duration::hours(2)))
            .await
            .unwrap();

        let analytics = AnalyticsAggregator::new(store);
        let v1 = analytics.vehicle_performance_as_of("v-1", DEFAULT_WINDOW, NOW).await.unwrap();
        let v2 = analytics.vehicle_performance_as_of("v-2", DEFAULT_WINDOW, NOW).await.unwrap();

        assert_eq!(v1.total_ac_kwh, 10.0);
        assert_eq!(v2.total_ac_kwh, 6.0);
    }

    #[tokio::test]
    async fn custom_window_narrows_the_scan() {
        let analytics = seeded(vec![
            vehicle("v-1", 3.0, 25.0, NOW - Duration::hours(30)),
            vehicle("v-1", 2.0, 25.0, NOW - Duration::hours(1)),
        ])
        .await
        .with_window(Duration::hours(48));

        let wide = analytics
            .vehicle_performance_as_of("v-1", analytics.window(), NOW)
            .await
            .unwrap();
        let narrow = analytics
            .vehicle_performance_as_of("v-1", Duration::hours(2), NOW)
            .await
            .unwrap();

        assert_eq!(wide.total_dc_kwh, 5.0);
        assert_eq!(narrow.total_dc_kwh, 2.0);
    }

    #[tokio::test]
    async fn non_positive_window_is_rejected() {
        let analytics = seeded(vec![]).await;

        let err = analytics
            .vehicle_performance_over("v-1", Duration::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::InvalidWindow(_)));
    }
}
