use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicleSample {
    pub vehicle_id: String,
    /// State of charge, percent.
    pub soc: f64,
    pub kwh_delivered_dc: f64,
    pub battery_temp: f64,
    pub timestamp: OffsetDateTime,
}

/// Append-only history row in `vehicle_telemetry`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VehicleSample {
    pub id: i64,
    pub vehicle_id: String,
    pub soc: f64,
    pub kwh_delivered_dc: f64,
    pub battery_temp: f64,
    #[sqlx(rename = "ts")]
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub recorded_at: OffsetDateTime,
}

/// Latest-state row in `vehicle_status`, one per vehicle.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VehicleStatus {
    pub vehicle_id: String,
    pub last_soc: f64,
    pub last_kwh_delivered_dc: f64,
    pub last_battery_temp: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_seen_at: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub updated_at: OffsetDateTime,
}

impl VehicleStatus {
    pub fn from_sample(sample: &NewVehicleSample, updated_at: OffsetDateTime) -> Self {
        Self {
            vehicle_id: sample.vehicle_id.clone(),
            last_soc: sample.soc,
            last_kwh_delivered_dc: sample.kwh_delivered_dc,
            last_battery_temp: sample.battery_temp,
            last_seen_at: sample.timestamp,
            updated_at,
        }
    }
}
