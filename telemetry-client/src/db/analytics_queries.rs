use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::WindowTotals;

/// Aggregate one vehicle's DC delivery, battery temperature and AC
/// consumption from `since` onwards.
///
/// AC energy is matched through the `vehicle_id` denormalised onto each meter
/// row at ingestion time, not through the current mapping table. Both scans
/// hit the `(vehicle_id, ts)` indexes.
pub async fn vehicle_window_totals(
    pool: &PgPool,
    vehicle_id: &str,
    since: OffsetDateTime,
) -> Result<WindowTotals, sqlx::Error> {
    sqlx::query_as::<_, WindowTotals>(
        r#"
        WITH vehicle_stats AS (
            SELECT
                SUM(kwh_delivered_dc) AS total_dc,
                AVG(battery_temp)     AS avg_temp,
                COUNT(*)              AS v_count
            FROM vehicle_telemetry
            WHERE vehicle_id = $1
              AND ts >= $2
        ),
        meter_stats AS (
            SELECT
                SUM(kwh_consumed_ac) AS total_ac
            FROM meter_telemetry
            WHERE vehicle_id = $1
              AND ts >= $2
        )
        SELECT
            COALESCE(v.total_dc, 0)::DOUBLE PRECISION AS total_dc_kwh,
            COALESCE(v.avg_temp, 0)::DOUBLE PRECISION AS avg_battery_temp,
            COALESCE(v.v_count, 0)::BIGINT            AS sample_count,
            COALESCE(m.total_ac, 0)::DOUBLE PRECISION AS total_ac_kwh
        FROM vehicle_stats v
        CROSS JOIN meter_stats m
        "#,
    )
    .bind(vehicle_id)
    .bind(since)
    .fetch_one(pool)
    .await
}
