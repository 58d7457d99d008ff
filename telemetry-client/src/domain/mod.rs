mod meter;
mod performance;
mod vehicle;

pub use meter::{MeterSample, MeterStatus, NewMeterSample};
pub use performance::{round_to, VehiclePerformance, WindowTotals};
pub use vehicle::{NewVehicleSample, VehicleSample, VehicleStatus};
