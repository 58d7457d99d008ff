//! Process-local telemetry store for local development and tests.
//!
//! Writes are staged on the transaction and applied under a single write lock
//! on commit, so readers never observe half of an ingestion.

use std::{collections::HashMap, sync::Arc};

use ev_telemetry_client::domain::{
    MeterSample, MeterStatus, NewMeterSample, NewVehicleSample, VehicleSample, VehicleStatus,
    WindowTotals,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{StorageError, TelemetryStore, TelemetryTx};

#[derive(Default)]
struct Tables {
    meter_samples: Vec<MeterSample>,
    vehicle_samples: Vec<VehicleSample>,
    meter_status: HashMap<String, MeterStatus>,
    vehicle_status: HashMap<String, VehicleStatus>,
    mappings: HashMap<String, String>,
    last_id: i64,
    last_recorded_at: Option<OffsetDateTime>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Commit clock; never runs backwards so `recorded_at` follows commit order.
    fn recorded_at(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let at = match self.last_recorded_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_recorded_at = Some(at);
        at
    }

    fn apply(&mut self, write: StagedWrite, at: OffsetDateTime) {
        match write {
            StagedWrite::MeterSample(s) => {
                let id = self.next_id();
                self.meter_samples.push(MeterSample {
                    id,
                    meter_id: s.meter_id,
                    kwh_consumed_ac: s.kwh_consumed_ac,
                    voltage: s.voltage,
                    vehicle_id: s.vehicle_id,
                    timestamp: s.timestamp,
                    recorded_at: at,
                });
            }
            StagedWrite::MeterStatus(s) => {
                self.meter_status
                    .insert(s.meter_id.clone(), MeterStatus::from_sample(&s, at));
            }
            StagedWrite::VehicleSample(s) => {
                let id = self.next_id();
                self.vehicle_samples.push(VehicleSample {
                    id,
                    vehicle_id: s.vehicle_id,
                    soc: s.soc,
                    kwh_delivered_dc: s.kwh_delivered_dc,
                    battery_temp: s.battery_temp,
                    timestamp: s.timestamp,
                    recorded_at: at,
                });
            }
            StagedWrite::VehicleStatus(s) => {
                self.vehicle_status
                    .insert(s.vehicle_id.clone(), VehicleStatus::from_sample(&s, at));
            }
        }
    }
}

enum StagedWrite {
    MeterSample(NewMeterSample),
    MeterStatus(NewMeterSample),
    VehicleSample(NewVehicleSample),
    VehicleStatus(NewVehicleSample),
}

#[derive(Clone, Default)]
pub struct InMemoryTelemetryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with meter -> vehicle mappings.
    pub fn with_mappings<I, M, V>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (M, V)>,
        M: Into<String>,
        V: Into<String>,
    {
        let tables = Tables {
            mappings: mappings
                .into_iter()
                .map(|(m, v)| (m.into(), v.into()))
                .collect(),
            ..Tables::default()
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Administrative mapping change. Rows already ingested keep their vehicle.
    #[cfg(test)]
    pub async fn set_mapping(&self, meter_id: impl Into<String>, vehicle_id: impl Into<String>) {
        let mut tables = self.tables.write().await;
        tables.mappings.insert(meter_id.into(), vehicle_id.into());
    }

    #[cfg(test)]
    pub async fn remove_mapping(&self, meter_id: &str) -> Option<String> {
        let mut tables = self.tables.write().await;
        tables.mappings.remove(meter_id)
    }
}

pub struct InMemoryTx {
    tables: Arc<RwLock<Tables>>,
    staged: Vec<StagedWrite>,
}

#[async_trait::async_trait]
impl TelemetryTx for InMemoryTx {
    async fn find_mapped_vehicle(&mut self, meter_id: &str) -> Result<Option<String>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.mappings.get(meter_id).cloned())
    }

    async fn append_meter_sample(&mut self, sample: &NewMeterSample) -> Result<(), StorageError> {
        self.staged.push(StagedWrite::MeterSample(sample.clone()));
        Ok(())
    }

    async fn upsert_meter_status(&mut self, sample: &NewMeterSample) -> Result<(), StorageError> {
        self.staged.push(StagedWrite::MeterStatus(sample.clone()));
        Ok(())
    }

    async fn append_vehicle_sample(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError> {
        self.staged.push(StagedWrite::VehicleSample(sample.clone()));
        Ok(())
    }

    async fn upsert_vehicle_status(&mut self, sample: &NewVehicleSample) -> Result<(), StorageError> {
        self.staged.push(StagedWrite::VehicleStatus(sample.clone()));
        Ok(())
    }

    async fn commit(self) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let at = tables.recorded_at();
        for write in self.staged {
            tables.apply(write, at);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StorageError> {
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
        })
    }

    async fn vehicle_window_totals(
        &self,
        vehicle_id: &str,
        since: OffsetDateTime,
    ) -> Result<WindowTotals, StorageError> {
        let tables = self.tables.read().await;

        let mut totals = WindowTotals::default();
        let mut temp_sum = 0.0;
        for s in tables
            .vehicle_samples
            .iter()
            .filter(|s| s.vehicle_id == vehicle_id && s.timestamp >= since)
        {
            totals.total_dc_kwh += s.kwh_delivered_dc;
            temp_sum += s.battery_temp;
            totals.sample_count += 1;
        }
        if totals.sample_count > 0 {
            totals.avg_battery_temp = temp_sum / totals.sample_count as f64;
        }

        totals.total_ac_kwh = tables
            .meter_samples
            .iter()
            .filter(|s| s.vehicle_id.as_deref() == Some(vehicle_id) && s.timestamp >= since)
            .map(|s| s.kwh_consumed_ac)
            .sum();

        Ok(totals)
    }

    async fn meter_status(&self, meter_id: &str) -> Result<Option<MeterStatus>, StorageError> {
        Ok(self.tables.read().await.meter_status.get(meter_id).cloned())
    }

    async fn vehicle_status(&self, vehicle_id: &str) -> Result<Option<VehicleStatus>, StorageError> {
        Ok(self.tables.read().await.vehicle_status.get(vehicle_id).cloned())
    }

    async fn meter_history(
        &self,
        meter_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<MeterSample>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MeterSample> = tables
            .meter_samples
            .iter()
            .filter(|s| s.meter_id == meter_id && s.timestamp >= start && s.timestamp < end)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.timestamp, s.id));
        Ok(rows)
    }

    async fn vehicle_history(
        &self,
        vehicle_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<VehicleSample>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<VehicleSample> = tables
            .vehicle_samples
            .iter()
            .filter(|s| s.vehicle_id == vehicle_id && s.timestamp >= start && s.timestamp < end)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.timestamp, s.id));
        Ok(rows)
    }
}
