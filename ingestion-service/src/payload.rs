use ev_telemetry_client::domain::{NewMeterSample, NewVehicleSample};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::ingest::IngestError;

/// Inbound telemetry, discriminated by the JSON `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TelemetryPayload {
    Meter(MeterPayload),
    Vehicle(VehiclePayload),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterPayload {
    pub meter_id: String,
    pub kwh_consumed_ac: f64,
    pub voltage: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePayload {
    pub vehicle_id: String,
    pub soc: f64,
    pub kwh_delivered_dc: f64,
    pub battery_temp: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TelemetryPayload {
    /// Decode a JSON body. Any shape problem is a `MalformedPayload`.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(body).map_err(|e| IngestError::MalformedPayload(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Meter(_) => "meter",
            Self::Vehicle(_) => "vehicle",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::Meter(m) => &m.meter_id,
            Self::Vehicle(v) => &v.vehicle_id,
        }
    }
}

impl MeterPayload {
    pub fn into_sample(self, vehicle_id: Option<String>) -> NewMeterSample {
        NewMeterSample {
            meter_id: self.meter_id,
            kwh_consumed_ac: self.kwh_consumed_ac,
            voltage: self.voltage,
            vehicle_id,
            timestamp: self.timestamp,
        }
    }
}

impl From<VehiclePayload> for NewVehicleSample {
    fn from(v: VehiclePayload) -> Self {
        NewVehicleSample {
            vehicle_id: v.vehicle_id,
            soc: v.soc,
            kwh_delivered_dc: v.kwh_delivered_dc,
            battery_temp: v.battery_temp,
            timestamp: v.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn decodes_meter_payload() {
        let body = br#"{
            "type": "meter",
            "meterId": "m-123",
            "kwhConsumedAc": 12.5,
            "voltage": 230,
            "timestamp": "2024-05-01T10:00:00+02:00"
        }"#;

        let payload = TelemetryPayload::from_json_slice(body).unwrap();
        assert_eq!(
            payload,
            TelemetryPayload::Meter(MeterPayload {
                meter_id: "m-123".to_string(),
                kwh_consumed_ac: 12.5,
                voltage: 230.0,
                timestamp: datetime!(2024-05-01 08:00:00 UTC),
            })
        );
        assert_eq!(payload.kind(), "meter");
        assert_eq!(payload.device_id(), "m-123");
    }

    #[test]
    fn decodes_vehicle_payload() {
        let body = br#"{
            "type": "vehicle",
            "vehicleId": "v-1",
            "soc": 64.0,
            "kwhDeliveredDc": 7.25,
            "batteryTemp": 31.2,
            "timestamp": "2024-05-01T10:00:00Z"
        }"#;

        let payload = TelemetryPayload::from_json_slice(body).unwrap();
        match payload {
            TelemetryPayload::Vehicle(v) => {
                assert_eq!(v.vehicle_id, "v-1");
                assert_eq!(v.kwh_delivered_dc, 7.25);
                assert_eq!(v.timestamp, datetime!(2024-05-01 10:00:00 UTC));
            }
            other => panic!("expected vehicle payload, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_type() {
        let body = br#"{"meterId": "m-1", "kwhConsumedAc": 1.0, "voltage": 230.0, "timestamp": "2024-05-01T10:00:00Z"}"#;
        let err = TelemetryPayload::from_json_slice(body).unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[test]
    fn rejects_unknown_type() {
        let body = br#"{"type": "charger", "meterId": "m-1", "timestamp": "2024-05-01T10:00:00Z"}"#;
        let err = TelemetryPayload::from_json_slice(body).unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[test]
    fn rejects_missing_or_unparseable_timestamp() {
        let missing = br#"{"type": "meter", "meterId": "m-1", "kwhConsumedAc": 1.0, "voltage": 230.0}"#;
        assert!(matches!(
            TelemetryPayload::from_json_slice(missing),
            Err(IngestError::MalformedPayload(_))
        ));

        let garbage = br#"{"type": "meter", "meterId": "m-1", "kwhConsumedAc": 1.0, "voltage": 230.0, "timestamp": "yesterday"}"#;
        assert!(matches!(
            TelemetryPayload::from_json_slice(garbage),
            Err(IngestError::MalformedPayload(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let body = br#"{"type": "vehicle", "vehicleId": "v-1", "soc": "full", "kwhDeliveredDc": 1.0, "batteryTemp": 20.0, "timestamp": "2024-05-01T10:00:00Z"}"#;
        assert!(matches!(
            TelemetryPayload::from_json_slice(body),
            Err(IngestError::MalformedPayload(_))
        ));
    }
}
