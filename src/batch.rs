//! Batch collector: repeated recording sessions under one data directory.
//!
//! A collector owns the pipeline and a timestamped root directory
//! (`data__DD_MM_YYYY__HH_MM_SS`, created once). Each batch records into its
//! own numbered subdirectory (`NNN__HH_MM_SS`) containing `ir.csv` and
//! `ir.avi`. Timestamps are UTC, computed without a date-time dependency.

use crate::pipeline::Pipeline;
use crate::session::RecordingSummary;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Calendar components of a Unix timestamp, UTC.
struct CivilTime {
    year: i64,
    month: u32,
    day: u32,
    hour: u64,
    minute: u64,
    second: u64,
}

fn civil_from_unix(secs: u64) -> CivilTime {
    let secs_per_day = 86400u64;
    let days = secs / secs_per_day;
    let time_of_day = secs % secs_per_day;

    let mut year = 1970i64;
    let mut remaining_days = days as i64;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }
    let days_in_months = [
        31,
        if is_leap(year) { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month = 0usize;
    while remaining_days >= days_in_months[month] {
        remaining_days -= days_in_months[month];
        month += 1;
    }

    CivilTime {
        year,
        month: month as u32 + 1,
        day: remaining_days as u32 + 1,
        hour: time_of_day / 3600,
        minute: (time_of_day % 3600) / 60,
        second: time_of_day % 60,
    }
}

fn is_leap(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn root_dir_name(unix_secs: u64) -> String {
    let t = civil_from_unix(unix_secs);
    format!(
        "data__{:02}_{:02}_{}__{:02}_{:02}_{:02}",
        t.day, t.month, t.year, t.hour, t.minute, t.second
    )
}

fn batch_dir_name(batch_number: u32, unix_secs: u64) -> String {
    let t = civil_from_unix(unix_secs);
    format!(
        "{:03}__{:02}_{:02}_{:02}",
        batch_number, t.hour, t.minute, t.second
    )
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Owns the pipeline and the on-disk layout of recorded batches.
pub struct BatchCollector {
    pipeline: Pipeline,
    root_dir: PathBuf,
    batch_number: u32,
}

impl BatchCollector {
    /// Create the timestamped root directory under `data_dir` and wrap
    /// `pipeline`.
    pub fn new<P: AsRef<Path>>(pipeline: Pipeline, data_dir: P) -> Result<Self> {
        let root_dir = data_dir.as_ref().join(root_dir_name(unix_secs()));
        std::fs::create_dir_all(&root_dir)
            .with_context(|| format!("creating data root {}", root_dir.display()))?;
        info!("recording batches to root directory '{}'", root_dir.display());
        Ok(BatchCollector {
            pipeline,
            root_dir,
            batch_number: 0,
        })
    }

    /// Root directory all batches land under.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// The wrapped pipeline, for snapshots and stats.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Create the next numbered batch directory and start recording
    /// `ir.csv` / `ir.avi` into it. Returns the batch directory.
    pub fn start_batch(&mut self) -> Result<PathBuf> {
        let batch_dir = self
            .root_dir
            .join(batch_dir_name(self.batch_number, unix_secs()));
        std::fs::create_dir_all(&batch_dir)
            .with_context(|| format!("creating batch directory {}", batch_dir.display()))?;
        info!("starting batch recording in '{}'", batch_dir.display());

        self.pipeline
            .start_recording(batch_dir.join("ir.csv"), batch_dir.join("ir.avi"))
            .context("starting recording session")?;
        Ok(batch_dir)
    }

    /// Stop the in-flight batch and advance the batch number. The number
    /// advances even when stopping fails, so a broken batch never gets
    /// overwritten by the next one.
    pub fn finish_batch(&mut self) -> Result<RecordingSummary> {
        let result = self
            .pipeline
            .stop_recording()
            .context("stopping recording session");
        self.batch_number += 1;
        let summary = result?;
        info!(
            "batch finished: {} rows, {} video frames",
            summary.rows_written, summary.video_frames
        );
        Ok(summary)
    }

    /// Tear down the pipeline, finishing any in-flight batch first.
    pub fn shutdown(self) -> Result<()> {
        self.pipeline.shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PIXEL_COUNT;
    use crate::sensor::{SensorError, ThermalSensor};
    use std::time::Duration;

    struct SteadySensor;
    impl ThermalSensor for SteadySensor {
        fn read_frame(&mut self) -> Result<[f32; PIXEL_COUNT], SensorError> {
            Ok([22.0; PIXEL_COUNT])
        }
    }

    #[test]
    fn test_root_dir_name_shape() {
        assert_eq!(root_dir_name(0), "data__01_01_1970__00_00_00");
        // 2021-03-02 04:05:06 UTC
        assert_eq!(root_dir_name(1614657906), "data__02_03_2021__04_05_06");
    }

    #[test]
    fn test_batch_dir_name_zero_padding() {
        assert_eq!(batch_dir_name(0, 0), "000__00_00_00");
        assert_eq!(batch_dir_name(7, 3661), "007__01_01_01");
        assert_eq!(batch_dir_name(123, 86399), "123__23_59_59");
    }

    #[test]
    fn test_leap_year_handling() {
        // 2020-02-29 12:00:00 UTC
        assert_eq!(root_dir_name(1582977600), "data__29_02_2020__12_00_00");
        // 2100 is not a leap year: 2100-03-01 00:00:00 UTC
        assert_eq!(root_dir_name(4107542400), "data__01_03_2100__00_00_00");
    }

    #[test]
    fn test_batches_land_in_numbered_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::builder()
            .sample_period(Duration::from_millis(2))
            .zoom(2)
            .start(SteadySensor);
        let mut collector = BatchCollector::new(pipeline, dir.path()).unwrap();

        let first = collector.start_batch().unwrap();
        std::thread::sleep(Duration::from_millis(40));
        collector.finish_batch().unwrap();

        let second = collector.start_batch().unwrap();
        std::thread::sleep(Duration::from_millis(40));
        let summary = collector.finish_batch().unwrap();

        assert!(first.file_name().unwrap().to_str().unwrap().starts_with("000__"));
        assert!(second.file_name().unwrap().to_str().unwrap().starts_with("001__"));
        assert!(first.join("ir.csv").exists());
        assert!(first.join("ir.avi").exists());
        assert!(second.join("ir.csv").exists());
        assert!(summary.rows_written > 0);

        collector.shutdown().unwrap();
    }

    #[test]
    fn test_finish_without_start_advances_batch_number() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::builder()
            .sample_period(Duration::from_millis(5))
            .zoom(2)
            .start(SteadySensor);
        let mut collector = BatchCollector::new(pipeline, dir.path()).unwrap();

        assert!(collector.finish_batch().is_err());
        let batch = collector.start_batch().unwrap();
        assert!(batch.file_name().unwrap().to_str().unwrap().starts_with("001__"));
        collector.finish_batch().unwrap();
        collector.shutdown().unwrap();
    }
}
