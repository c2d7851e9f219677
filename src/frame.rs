//! Thermal frame value type.
//!
//! The sensor is an MLX90640-class device with a fixed 24×32 geometry. One
//! [`ThermalFrame`] is one complete readout: 768 temperatures in degrees
//! Celsius, row-major, plus the wall-clock capture time. Frames are plain
//! values: each pipeline stage owns its copy outright, which is what lets
//! the latest-frame cache hand out snapshots no writer can mutate underneath
//! a reader.

/// Sensor rows (vertical resolution).
pub const SENSOR_ROWS: usize = 24;
/// Sensor columns (horizontal resolution).
pub const SENSOR_COLS: usize = 32;
/// Total pixels per readout.
pub const PIXEL_COUNT: usize = SENSOR_ROWS * SENSOR_COLS;

/// One timestamped temperature readout from the thermal sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalFrame {
    /// Temperatures in °C, row-major (`data[row * SENSOR_COLS + col]`).
    pub data: [f32; PIXEL_COUNT],
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: f64,
}

impl ThermalFrame {
    /// Wrap a raw readout with its capture timestamp.
    pub fn new(data: [f32; PIXEL_COUNT], timestamp: f64) -> Self {
        ThermalFrame { data, timestamp }
    }

    /// Temperature at `(row, col)`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        debug_assert!(row < SENSOR_ROWS && col < SENSOR_COLS);
        self.data[row * SENSOR_COLS + col]
    }

    /// Minimum temperature in the frame.
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Maximum temperature in the frame.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}
