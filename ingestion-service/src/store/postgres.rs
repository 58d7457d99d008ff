use std::str::FromStr;

use ev_telemetry_client::{
    db::{analytics_queries, history_queries, status_queries},
    domain::{
        MeterSample, MeterStatus, NewMeterSample, NewVehicleSample, VehicleSample, VehicleStatus,
        WindowTotals,
    },
};
use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode},
    Postgres, Transaction,
};
use time::OffsetDateTime;

use super::{StorageError, TelemetryStore, TelemetryTx};
use crate::config::PostgresConfig;

#[derive(Clone)]
pub struct PostgresTelemetryStore {
    pool: PgPool,
}

impl PostgresTelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(cfg: &PostgresConfig) -> Result<Self, StorageError> {
        let mut options = PgConnectOptions::from_str(&cfg.uri)?;
        if cfg.require_ssl {
            options = options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One Postgres transaction. sqlx rolls it back if dropped uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl TelemetryTx for PostgresTx {
    async fn find_mapped_vehicle(&mut self, meter_id: &str) -> Result<Option<String>, StorageError> {
        let vehicle_id = sqlx::query_scalar::<_, String>(
            "SELECT vehicle_id FROM smart_meter_mapping WHERE meter_id = $1",
        )
        .bind(meter_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(vehicle_id)
    }

    async fn append_meter_sample(&mut self, sample: &NewMeterSample) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO meter_telemetry (meter_id, kwh_consumed_ac, voltage, vehicle_id, ts)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&sample.meter_id)
        .bind(sample.kwh_consumed_ac)
        .bind(sample.voltage)
        .bind(&sample.vehicle_id)
        .bind(sample.timestamp)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn upsert_meter_status(&mut self, sample: &NewMeterSample) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO meter_status (meter_id, last_kwh_consumed_ac, last_voltage, last_seen_at, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (meter_id) DO UPDATE SET
                last_kwh_consumed_ac = EXCLUDED.last_kwh_consumed_ac,
                last_voltage         = EXCLUDED.last_voltage,
                last_seen_at         = EXCLUDED.last_seen_at,
                updated_at           = EXCLUDED.updated_at
            "#,
        )
        .bind(&sample.meter_id)
        .bind(sample.kwh_consumed_ac)
        .bind(sample.voltage)
        .bind(sample.timestamp)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_vehicle_sample(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO vehicle_telemetry (vehicle_id, soc, kwh_delivered_dc, battery_temp, ts)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&sample.vehicle_id)
        .bind(sample.soc)
        .bind(sample.kwh_delivered_dc)
        .bind(sample.battery_temp)
        .bind(sample.timestamp)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn upsert_vehicle_status(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO vehicle_status
                (vehicle_id, last_soc, last_kwh_delivered_dc, last_battery_temp, last_seen_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (vehicle_id) DO UPDATE SET
                last_soc              = EXCLUDED.last_soc,
                last_kwh_delivered_dc = EXCLUDED.last_kwh_delivered_dc,
                last_battery_temp     = EXCLUDED.last_battery_temp,
                last_seen_at          = EXCLUDED.last_seen_at,
                updated_at            = EXCLUDED.updated_at
            "#,
        )
        .bind(&sample.vehicle_id)
        .bind(sample.soc)
        .bind(sample.kwh_delivered_dc)
        .bind(sample.battery_temp)
        .bind(sample.timestamp)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TelemetryStore for PostgresTelemetryStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx })
    }

    async fn vehicle_window_totals(
        &self,
        vehicle_id: &str,
        since: OffsetDateTime,
    ) -> Result<WindowTotals, StorageError> {
        Ok(analytics_queries::vehicle_window_totals(&self.pool, vehicle_id, since).await?)
    }

    async fn meter_status(&self, meter_id: &str) -> Result<Option<MeterStatus>, StorageError> {
        Ok(status_queries::meter_status(&self.pool, meter_id).await?)
    }

    async fn vehicle_status(&self, vehicle_id: &str) -> Result<Option<VehicleStatus>, StorageError> {
        Ok(status_queries::vehicle_status(&self.pool, vehicle_id).await?)
    }

    async fn meter_history(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<MeterSample>, StorageError> {
        Ok(history_queries::meter_history(&self.pool, meter_id, start, end).await?)
    }

    async fn vehicle_history(
        &self,
        vehicle_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<VehicleSample>, StorageError> {
        Ok(history_queries::vehicle_history(&self.pool, vehicle_id, start, end).await?)
    }
}
