//! Ingestion coordinator: identity resolution, cold append and hot upsert for
//! one sample, all inside a single storage transaction.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ev_telemetry_client::domain::NewVehicleSample;

use crate::{
    identity::{self, VehicleResolution},
    payload::{MeterPayload, TelemetryPayload, VehiclePayload},
    store::{StorageError, TelemetryStore, TelemetryTx},
    transform,
};

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

impl IngestError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed",
            Self::StorageUnavailable(_) => "storage",
        }
    }
}

/// What a committed ingestion wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Meter {
        meter_id: String,
        vehicle: VehicleResolution,
    },
    Vehicle {
        vehicle_id: String,
    },
}

pub struct IngestionCoordinator<S> {
    store: Arc<S>,
    timeout: Option<Duration>,
}

impl<S> Clone for IngestionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<S: TelemetryStore> IngestionCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, timeout: None }
    }

    /// Bound the writes of each call; an expired call drops its transaction
    /// uncommitted. The commit itself is never cut short.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate and durably record one sample.
    ///
    /// Either both the history row and the status row are committed, or
    /// neither is. Storage failures are returned to the caller unretried.
    pub async fn ingest(&self, payload: TelemetryPayload) -> Result<IngestOutcome, IngestError> {
        transform::validate_payload(&payload)?;

        let kind = payload.kind();
        let device_id = payload.device_id().to_string();
        let started = Instant::now();

        let res = self.ingest_atomically(payload).await;

        metrics::histogram!("ingest_transaction_seconds", "kind" => kind)
            .record(started.elapsed().as_secs_f64());

        match &res {
            Ok(_) => {
                metrics::counter!("telemetry_ingested_total", "kind" => kind).increment(1);
                tracing::debug!(kind, device_id = %device_id, "telemetry sample committed");
            }
            Err(e) => {
                metrics::counter!("telemetry_ingest_failed_total", "reason" => e.reason()).increment(1);
                tracing::error!(error = %e, kind, device_id = %device_id, "telemetry ingestion failed");
            }
        }

        res
    }

    async fn ingest_atomically(&self, payload: TelemetryPayload) -> Result<IngestOutcome, IngestError> {
        let staged = async {
            let mut tx = self.store.begin().await?;

            let res = match payload {
                TelemetryPayload::Meter(m) => record_meter(&mut tx, m).await,
                TelemetryPayload::Vehicle(v) => record_vehicle(&mut tx, v).await,
            };

            match res {
                Ok(outcome) => Ok::<_, StorageError>((tx, outcome)),
                Err(e) => {
                    if let Err(rb) = tx.rollback().await {
                        tracing::warn!(error = %rb, "explicit rollback failed, transaction discarded");
                    }
                    Err(e)
                }
            }
        };

        // The deadline covers the staged writes only. Once COMMIT is issued
        // its result is the result of the call.
        let (tx, outcome) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, staged)
                .await
                .unwrap_or(Err(StorageError::Timeout(limit)))?,
            None => staged.await?,
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

async fn record_meter<T: TelemetryTx>(
    tx: &mut T,
    payload: MeterPayload,
) -> Result<IngestOutcome, StorageError> {
    let vehicle = identity::resolve_vehicle(tx, &payload.meter_id).await?;
    if vehicle == VehicleResolution::Unmapped {
        metrics::counter!("telemetry_unmapped_meter_total").increment(1);
        tracing::warn!(meter_id = %payload.meter_id, "no vehicle mapping found for meter");
    }

    let meter_id = payload.meter_id.clone();
    let sample = payload.into_sample(vehicle.vehicle_id().map(str::to_owned));

    // cold, then hot
    tx.append_meter_sample(&sample).await?;
    tx.upsert_meter_status(&sample).await?;

    Ok(IngestOutcome::Meter { meter_id, vehicle })
}

async fn record_vehicle<T: TelemetryTx>(
    tx: &mut T,
    payload: VehiclePayload,
) -> Result<IngestOutcome, StorageError> {
    let sample = NewVehicleSample::from(payload);

    tx.append_vehicle_sample(&sample).await?;
    tx.upsert_vehicle_status(&sample).await?;

    Ok(IngestOutcome::Vehicle {
        vehicle_id: sample.vehicle_id,
    })
}
