//! Sensor abstraction and a hardware-free synthetic implementation.
//!
//! The pipeline only ever asks its sensor for one readout at a time; cadence
//! is the reader loop's business. Real MLX90640 hardware plugs in behind
//! [`ThermalSensor`]; [`SyntheticSensor`] generates a plausible scene (warm
//! blob drifting over an ambient field, with noise) so the full pipeline runs
//! on a development machine.

use crate::frame::{PIXEL_COUNT, SENSOR_COLS, SENSOR_ROWS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Errors from a single sensor readout. All variants are treated as
/// transient by the reader loop: logged, backed off, retried.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Bus- or driver-level I/O failure.
    #[error("sensor I/O error: {0}")]
    Io(String),
    /// The readout arrived but failed validation.
    #[error("invalid frame from sensor: {0}")]
    InvalidFrame(String),
    /// The readout did not arrive in time.
    #[error("sensor read timed out")]
    Timeout,
}

/// Produces one raw 24×32 readout on demand.
pub trait ThermalSensor {
    /// Acquire one frame of temperatures in °C, row-major.
    fn read_frame(&mut self) -> Result<[f32; PIXEL_COUNT], SensorError>;
}

/// Optional downstream consumer of recorded frames (e.g. an inference
/// stage). Best-effort: failures are logged by the writer and otherwise
/// ignored.
pub trait FrameProcessor {
    /// Consume one raw frame.
    fn process_frame(&mut self, frame: &crate::frame::ThermalFrame) -> anyhow::Result<()>;
}

/// Synthetic scene generator: ambient field plus a warm blob tracing a slow
/// circle, with per-pixel noise.
pub struct SyntheticSensor {
    rng: StdRng,
    tick: u64,
    ambient: f32,
    blob_peak: f32,
}

impl SyntheticSensor {
    /// Deterministic sensor for a given seed.
    pub fn new(seed: u64) -> Self {
        SyntheticSensor {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            ambient: 21.0,
            blob_peak: 13.0, // peak °C above ambient, body-temperature-ish
        }
    }
}

impl ThermalSensor for SyntheticSensor {
    fn read_frame(&mut self) -> Result<[f32; PIXEL_COUNT], SensorError> {
        // Blob center orbits the frame center, one revolution per 120 reads.
        let angle = self.tick as f32 / 120.0 * std::f32::consts::TAU;
        let cx = SENSOR_COLS as f32 / 2.0 + angle.cos() * 8.0;
        let cy = SENSOR_ROWS as f32 / 2.0 + angle.sin() * 5.0;
        self.tick += 1;

        let mut data = [0.0f32; PIXEL_COUNT];
        for row in 0..SENSOR_ROWS {
            for col in 0..SENSOR_COLS {
                let dx = col as f32 - cx;
                let dy = row as f32 - cy;
                let blob = self.blob_peak * (-(dx * dx + dy * dy) / 18.0).exp();
                let noise: f32 = self.rng.random_range(-0.15..0.15);
                data[row * SENSOR_COLS + col] = self.ambient + blob + noise;
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frames_look_like_a_scene() {
        let mut sensor = SyntheticSensor::new(42);
        let data = sensor.read_frame().unwrap();

        let min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        // Ambient with noise at the edges, warm blob somewhere inside.
        assert!(min > 19.0 && min < 22.0, "min {}", min);
        assert!(max > 28.0 && max < 36.0, "max {}", max);
    }

    #[test]
    fn test_synthetic_is_deterministic_per_seed() {
        let mut a = SyntheticSensor::new(7);
        let mut b = SyntheticSensor::new(7);
        assert_eq!(a.read_frame().unwrap(), b.read_frame().unwrap());
    }

    #[test]
    fn test_blob_moves_between_reads() {
        let mut sensor = SyntheticSensor::new(1);
        let first = sensor.read_frame().unwrap();
        for _ in 0..30 {
            sensor.read_frame().unwrap();
        }
        let later = sensor.read_frame().unwrap();

        let hottest = |d: &[f32; PIXEL_COUNT]| {
            d.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap()
        };
        assert_ne!(hottest(&first), hottest(&later));
    }
}
