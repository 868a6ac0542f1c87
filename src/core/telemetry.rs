//! Canonical telemetry snapshot and per-source raw samples.

use tracing::error;

/// The fully-merged telemetry record at a point in time.
///
/// Snapshots are compared by full structural equality to decide whether a
/// change happened; that comparison is the sole gate for forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub rpm: f32,
    pub oil_pressure: f32,
    pub speed: f32,

    pub fuel_remaining: f32,
    pub fuel_level: u8,

    pub oil_temp: f32,
    pub coolant_temp: f32,
    pub air_intake_temp: f32,
    pub battery_voltage: f32,

    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
    pub track: f32,
    pub gps_speed: f32,
    pub gas_pedal_angle: u8,
}

/// Raw GPS reading before unit normalization.
///
/// Latitude and longitude are in 1e-7 degrees, altitude in centimeters,
/// exactly as the receiver reports them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsSample {
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
    pub track: f64,
    pub speed: f64,
}

/// Raw engine-control-unit reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EcuSample {
    pub gas_pedal_angle: i32,
    pub rpm: f32,
    pub oil_pressure: f32,
    pub speed: i32,
    pub coolant_temp: f32,
    pub air_intake_temp: f32,
    pub battery_voltage: f32,
}

/// Raw CAN sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanSensorSample {
    pub fuel_remaining: f32,
    pub fuel_level: i32,
    pub coolant_temp: i32,
    pub oil_temp: i32,
}

/// A dynamically-typed metric value as delivered by the diagnostic link.
///
/// The link reports most metrics as integers or doubles depending on the
/// measurement group, plus textual identification fields for some blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Normalize a vendor metric value to single precision.
///
/// Non-numeric representations are logged and collapse to zero rather than
/// failing the measurement callback.
pub fn normalize(value: &MetricValue) -> f32 {
    match value {
        MetricValue::Int(v) => *v as f32,
        MetricValue::Float(v) => *v as f32,
        other => {
            error!(value = ?other, "unable to normalize metric value");
            0.0
        }
    }
}
