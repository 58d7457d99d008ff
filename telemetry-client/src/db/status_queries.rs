use sqlx::PgPool;

use crate::domain::{MeterStatus, VehicleStatus};

pub async fn meter_status(pool: &PgPool, meter_id: &str) -> Result<Option<MeterStatus>, sqlx::Error> {
    sqlx::query_as::<_, MeterStatus>(
        r#"
        SELECT meter_id, last_kwh_consumed_ac, last_voltage, last_seen_at, updated_at
        FROM meter_status
        WHERE meter_id = $1
        "#,
    )
    .bind(meter_id)
    .fetch_optional(pool)
    .await
}

pub async fn vehicle_status(pool: &PgPool, vehicle_id: &str) -> Result<Option<VehicleStatus>, sqlx::Error> {
    sqlx::query_as::<_, VehicleStatus>(
        r#"
        SELECT vehicle_id, last_soc, last_kwh_delivered_dc, last_battery_temp, last_seen_at, updated_at
        FROM vehicle_status
        WHERE vehicle_id = $1
        "#,
    )
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await
}
