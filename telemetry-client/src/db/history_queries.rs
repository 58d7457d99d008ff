use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{MeterSample, VehicleSample};

/// Cold-store history for a single meter in `[start, end)`, ordered by event
/// time and then by insertion.
pub async fn meter_history(
    pool: &PgPool,
    meter_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<MeterSample>, sqlx::Error> {
    sqlx::query_as::<_, MeterSample>(
        r#"
        SELECT
            id,
            meter_id,
            kwh_consumed_ac,
            voltage,
            vehicle_id,
            ts,
            recorded_at
        FROM meter_telemetry
        WHERE meter_id = $1
          AND ts >= $2
          AND ts <  $3
        ORDER BY ts, id
        "#,
    )
    .bind(meter_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

pub async fn vehicle_history(
    pool: &PgPool,
    vehicle_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<VehicleSample>, sqlx::Error> {
    sqlx::query_as::<_, VehicleSample>(
        r#"
        SELECT
            id,
            vehicle_id,
            soc,
            kwh_delivered_dc,
            battery_temp,
            ts,
            recorded_at
        FROM vehicle_telemetry
        WHERE vehicle_id = $1
          AND ts >= $2
          AND ts <  $3
        ORDER BY ts, id
        "#,
    )
    .bind(vehicle_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}
