/// Raw aggregates over one vehicle's trailing window, straight from storage.
///
/// All fields are zero when nothing matched; never null.
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct WindowTotals {
    pub total_dc_kwh: f64,
    pub avg_battery_temp: f64,
    pub sample_count: i64,
    pub total_ac_kwh: f64,
}

/// Presentation snapshot of a vehicle's charging efficiency.
///
/// Energy and temperature are rounded to 2 decimals, the ratio to 4.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VehiclePerformance {
    pub vehicle_id: String,
    pub total_ac_kwh: f64,
    pub total_dc_kwh: f64,
    pub efficiency_ratio: f64,
    pub avg_battery_temp: f64,
    pub total_samples: i64,
}

const ENERGY_DECIMALS: i32 = 2;
const RATIO_DECIMALS: i32 = 4;

impl VehiclePerformance {
    /// Derive the efficiency ratio (DC out / AC in) and round for display.
    ///
    /// The ratio is computed from unrounded totals and is 0 whenever the AC
    /// total is not strictly positive.
    pub fn from_totals(vehicle_id: impl Into<String>, totals: WindowTotals) -> Self {
        let efficiency = if totals.total_ac_kwh > 0.0 {
            totals.total_dc_kwh / totals.total_ac_kwh
        } else {
            0.0
        };

        Self {
            vehicle_id: vehicle_id.into(),
            total_ac_kwh: round_to(totals.total_ac_kwh, ENERGY_DECIMALS),
            total_dc_kwh: round_to(totals.total_dc_kwh, ENERGY_DECIMALS),
            efficiency_ratio: round_to(efficiency, RATIO_DECIMALS),
            avg_battery_temp: round_to(totals.avg_battery_temp, ENERGY_DECIMALS),
            total_samples: totals.sample_count,
        }
    }
}

/// Round half away from zero to `decimals` places. Non-finite input maps to 0.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
