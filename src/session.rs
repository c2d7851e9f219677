//! Recording session: the bounded lifetime of one CSV trace + one video.
//!
//! A session owns both sinks and the session-local row counter. It is
//! created with both sinks already open (so a failed open never leaves a
//! half-configured session) and consumed by [`RecordingSession::finish`],
//! which flushes the trace and finalizes the AVI. The writer loop feeds it
//! one frame at a time; every per-frame failure is reported as a
//! [`WriterIterationError`] and contained by the caller — a bad frame never
//! tears down the session or the writer.

use crate::avi::AviWriter;
use crate::csv::CsvSink;
use crate::frame::ThermalFrame;
use crate::render::{HeatmapRenderer, RenderError, RenderOptions};
use crate::sensor::FrameProcessor;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use thiserror::Error;

/// A failure inside one writer iteration. Logged and counted by the writer
/// loop, never propagated out of it.
#[derive(Debug, Error)]
pub enum WriterIterationError {
    /// CSV row could not be written.
    #[error("csv write failed: {0}")]
    Csv(#[source] io::Error),
    /// Heatmap rendering failed.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    /// JPEG encoding failed.
    #[error("jpeg encode failed: {0}")]
    Encode(#[source] anyhow::Error),
    /// Video chunk could not be written.
    #[error("video write failed: {0}")]
    Video(#[source] io::Error),
    /// The downstream processor rejected the frame. Best-effort: by the time
    /// this is raised the frame has already been persisted.
    #[error("frame forward failed: {0}")]
    Forward(#[source] anyhow::Error),
}

/// What a finished session wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSummary {
    /// CSV data rows written (excluding the header).
    pub rows_written: u64,
    /// Frames appended to the video.
    pub video_frames: u64,
}

/// Temperature bounds and encoding parameters fixed for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Lower color-mapping bound, °C.
    pub min_temp: f32,
    /// Upper color-mapping bound, °C.
    pub max_temp: f32,
    /// Video frame rate; should match the sensor cadence.
    pub fps: f64,
    /// JPEG quality for video frames (1–100).
    pub jpeg_quality: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        // Indoor ambient up to body temperature.
        SessionOptions {
            min_temp: 18.0,
            max_temp: 35.0,
            fps: 2.0,
            jpeg_quality: 90,
        }
    }
}

/// One active recording: open sinks plus the row counter.
pub struct RecordingSession {
    csv: CsvSink,
    video: AviWriter<BufWriter<File>>,
    rows_written: u64,
    options: SessionOptions,
}

impl RecordingSession {
    /// Open both sinks. On any failure nothing is kept open and no session
    /// exists; the CSV is opened first, so an AVI failure may still leave an
    /// empty trace file on disk.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        csv_path: P,
        avi_path: Q,
        renderer: &HeatmapRenderer,
        options: SessionOptions,
    ) -> io::Result<Self> {
        let csv = CsvSink::create(csv_path)?;
        let video = AviWriter::create(
            avi_path,
            renderer.output_width(),
            renderer.output_height(),
            options.fps,
        )?;
        Ok(RecordingSession {
            csv,
            video,
            rows_written: 0,
            options,
        })
    }

    /// Persist one frame: CSV row, then rendered video frame, then the
    /// best-effort forward to `processor`. The sequence number advances only
    /// when the row lands, keeping trace numbering dense across failures.
    pub fn write_frame(
        &mut self,
        frame: &ThermalFrame,
        renderer: &HeatmapRenderer,
        processor: Option<&mut (dyn FrameProcessor + Send + 'static)>,
    ) -> Result<(), WriterIterationError> {
        self.csv
            .write_row(self.rows_written, frame)
            .map_err(WriterIterationError::Csv)?;
        self.rows_written += 1;

        let rendered = renderer.render(
            frame,
            &RenderOptions {
                min_temp: Some(self.options.min_temp),
                max_temp: Some(self.options.max_temp),
                ..Default::default()
            },
        )?;
        let jpeg = rendered
            .to_jpeg(self.options.jpeg_quality)
            .map_err(WriterIterationError::Encode)?;
        self.video
            .write_frame(&jpeg)
            .map_err(WriterIterationError::Video)?;

        if let Some(p) = processor {
            p.process_frame(frame).map_err(WriterIterationError::Forward)?;
        }
        Ok(())
    }

    /// CSV rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush the trace and finalize the video, consuming the session.
    pub fn finish(mut self) -> io::Result<RecordingSummary> {
        self.csv.flush()?;
        self.video.finalize()?;
        Ok(RecordingSummary {
            rows_written: self.rows_written,
            video_frames: self.video.frame_count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::read_trace;
    use crate::frame::PIXEL_COUNT;

    fn frame(value: f32, timestamp: f64) -> ThermalFrame {
        ThermalFrame::new([value; PIXEL_COUNT], timestamp)
    }

    #[test]
    fn test_session_writes_matching_csv_and_video() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("ir.csv");
        let avi_path = dir.path().join("ir.avi");
        let renderer = HeatmapRenderer::new(4);

        let mut session =
            RecordingSession::open(&csv_path, &avi_path, &renderer, SessionOptions::default())
                .unwrap();
        for i in 0..5 {
            session
                .write_frame(&frame(20.0 + i as f32, i as f64), &renderer, None)
                .unwrap();
        }
        let summary = session.finish().unwrap();

        assert_eq!(summary.rows_written, 5);
        assert_eq!(summary.video_frames, 5);
        let records = read_trace(&csv_path).unwrap();
        assert_eq!(records.len(), 5);
        for (i, rec) in records.iter().enumerate() {
            assert_eq!(rec.no, i as u64);
            assert_eq!(rec.timestamp, i as f64);
        }
        assert!(avi_path.metadata().unwrap().len() > 224);
    }

    #[test]
    fn test_open_fails_on_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HeatmapRenderer::new(2);
        let missing = dir.path().join("nope").join("ir.csv");
        let avi = dir.path().join("ir.avi");
        assert!(
            RecordingSession::open(&missing, &avi, &renderer, SessionOptions::default()).is_err()
        );
    }

    #[test]
    fn test_forward_failure_after_persistence() {
        struct Rejecting;
        impl FrameProcessor for Rejecting {
            fn process_frame(&mut self, _frame: &ThermalFrame) -> anyhow::Result<()> {
                anyhow::bail!("busy")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let renderer = HeatmapRenderer::new(2);
        let mut session = RecordingSession::open(
            dir.path().join("ir.csv"),
            dir.path().join("ir.avi"),
            &renderer,
            SessionOptions::default(),
        )
        .unwrap();

        let mut processor = Rejecting;
        let err = session
            .write_frame(&frame(25.0, 1.0), &renderer, Some(&mut processor))
            .unwrap_err();
        assert!(matches!(err, WriterIterationError::Forward(_)));
        // The frame itself was persisted before the forward failed.
        assert_eq!(session.rows_written(), 1);
        let summary = session.finish().unwrap();
        assert_eq!(summary.video_frames, 1);
    }
}
