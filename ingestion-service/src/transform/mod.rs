use time::{macros::datetime, OffsetDateTime};

use crate::{
    ingest::IngestError,
    payload::{MeterPayload, TelemetryPayload, VehiclePayload},
};

const MIN_TS: OffsetDateTime = datetime!(2000-01-01 00:00:00 UTC);
const MAX_TS: OffsetDateTime = datetime!(2100-01-01 00:00:00 UTC);

fn malformed(msg: impl Into<String>) -> IngestError {
    IngestError::MalformedPayload(msg.into())
}

fn check_id(field: &str, id: &str) -> Result<(), IngestError> {
    if id.trim().is_empty() {
        return Err(malformed(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_finite(field: &str, value: f64) -> Result<(), IngestError> {
    if !value.is_finite() {
        return Err(malformed(format!("{field} must be a finite number")));
    }
    Ok(())
}

fn check_ts(ts: OffsetDateTime) -> Result<(), IngestError> {
    if ts < MIN_TS || ts > MAX_TS {
        return Err(malformed("timestamp out of allowed range"));
    }
    Ok(())
}

/// Pure validation of a meter payload.
///
/// Rules:
/// - meterId must be non-empty.
/// - kwhConsumedAc and voltage must be finite; kwhConsumedAc non-negative.
/// - timestamp must be within [2000-01-01, 2100-01-01].
pub fn validate_meter_payload(m: &MeterPayload) -> Result<(), IngestError> {
    check_id("meterId", &m.meter_id)?;
    check_finite("kwhConsumedAc", m.kwh_consumed_ac)?;
    check_finite("voltage", m.voltage)?;
    if m.kwh_consumed_ac < 0.0 {
        return Err(malformed("kwhConsumedAc must be non-negative"));
    }
    check_ts(m.timestamp)
}

/// Pure validation of a vehicle payload.
///
/// Rules:
/// - vehicleId must be non-empty.
/// - soc, kwhDeliveredDc and batteryTemp must be finite; soc within [0, 100].
/// - timestamp must be within the same window as meter payloads.
pub fn validate_vehicle_payload(v: &VehiclePayload) -> Result<(), IngestError> {
    check_id("vehicleId", &v.vehicle_id)?;
    check_finite("soc", v.soc)?;
    check_finite("kwhDeliveredDc", v.kwh_delivered_dc)?;
    check_finite("batteryTemp", v.battery_temp)?;
    if !(0.0..=100.0).contains(&v.soc) {
        return Err(malformed("soc must be within 0..=100"));
    }
    check_ts(v.timestamp)
}

pub fn validate_payload(payload: &TelemetryPayload) -> Result<(), IngestError> {
    let res = match payload {
        TelemetryPayload::Meter(m) => validate_meter_payload(m),
        TelemetryPayload::Vehicle(v) => validate_vehicle_payload(v),
    };
    if res.is_err() {
        metrics::counter!("validation_payload_rejected_total", "kind" => payload.kind()).increment(1);
    }
    res
}
