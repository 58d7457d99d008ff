//! Storage ports for the ingestion and analytics paths.
//!
//! A `TelemetryTx` is one atomic unit: every write staged through it becomes
//! visible on `commit` or not at all. Dropping a transaction without
//! committing rolls it back.

use std::time::Duration;

use ev_telemetry_client::domain::{
    MeterSample, MeterStatus, NewMeterSample, NewVehicleSample, VehicleSample, VehicleStatus,
    WindowTotals,
};
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryTelemetryStore, InMemoryTx};
pub use postgres::{PostgresTelemetryStore, PostgresTx};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait TelemetryTx: Send {
    /// Look up the vehicle currently mapped to `meter_id`.
    async fn find_mapped_vehicle(&mut self, meter_id: &str) -> Result<Option<String>, StorageError>;

    async fn append_meter_sample(&mut self, sample: &NewMeterSample) -> Result<(), StorageError>;

    /// Insert-or-overwrite the meter's status row from `sample`, last write wins.
    async fn upsert_meter_status(&mut self, sample: &NewMeterSample) -> Result<(), StorageError>;

    async fn append_vehicle_sample(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError>;

    async fn upsert_vehicle_status(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError>;

    async fn commit(self) -> Result<(), StorageError>;

    async fn rollback(self) -> Result<(), StorageError>;
}

#[async_trait::async_trait]
pub trait TelemetryStore: Send + Sync + 'static {
    type Tx: TelemetryTx + 'static;

    async fn begin(&self) -> Result<Self::Tx, StorageError>;

    /// Totals over a vehicle's samples with `timestamp >= since`.
    async fn vehicle_window_totals(
        &self,
        vehicle_id: &str,
        since: OffsetDateTime,
    ) -> Result<WindowTotals, StorageError>;

    async fn meter_status(&self, meter_id: &str) -> Result<Option<MeterStatus>, StorageError>;

    async fn vehicle_status(&self, vehicle_id: &str) -> Result<Option<VehicleStatus>, StorageError>;

    /// Cold rows in `[start, end)` ordered by timestamp.
    async fn meter_history(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<MeterSample>, StorageError>;

    async fn vehicle_history(
        &self,
        vehicle_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<VehicleSample>, StorageError>;
}
