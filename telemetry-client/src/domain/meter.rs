use time::OffsetDateTime;

/// A meter sample as handed to the cold store, before the store assigns
/// `id` and `recorded_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeterSample {
    pub meter_id: String,
    pub kwh_consumed_ac: f64,
    pub voltage: f64,
    /// Vehicle resolved from `smart_meter_mapping` at ingestion time. Never
    /// revised if the mapping changes later.
    pub vehicle_id: Option<String>,
    pub timestamp: OffsetDateTime,
}

/// Append-only history row in `meter_telemetry`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MeterSample {
    pub id: i64,
    pub meter_id: String,
    pub kwh_consumed_ac: f64,
    pub voltage: f64,
    pub vehicle_id: Option<String>,
    #[sqlx(rename = "ts")]
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub recorded_at: OffsetDateTime,
}

/// Latest-state row in `meter_status`, one per meter.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MeterStatus {
    pub meter_id: String,
    pub last_kwh_consumed_ac: f64,
    pub last_voltage: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_seen_at: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub updated_at: OffsetDateTime,
}

impl MeterStatus {
    /// Status row that `sample` leaves behind once upserted at `updated_at`.
    pub fn from_sample(sample: &NewMeterSample, updated_at: OffsetDateTime) -> Self {
        Self {
            meter_id: sample.meter_id.clone(),
            last_kwh_consumed_ac: sample.kwh_consumed_ac,
            last_voltage: sample.voltage,
            last_seen_at: sample.timestamp,
            updated_at,
        }
    }
}
