//! Acquisition/recording pipeline: the two long-lived worker threads.
//!
//! `Pipeline::builder()` configures and `start(sensor)` spawns the reader and writer
//! threads and returns the handle the rest of the process talks to. The
//! reader owns the sensor and its cadence: every period it acquires one
//! frame, publishes it to the latest-frame cache, and, only while a
//! recording session is active, pushes it onto the recording queue. The
//! writer drains that queue into the session's CSV and video sinks. Neither
//! thread ever exits on an error: sensor failures back off and retry,
//! writer failures skip the frame.
//!
//! Recording start/stop is the deterministic part: `start_recording` opens
//! both sinks before flipping the recording flag, and `stop_recording`
//! flips the flag off, waits for the queue to drain, and only then
//! finalizes and closes the sinks. Nothing is ever written after close and
//! nothing queued is ever dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use thermocap::pipeline::Pipeline;
//! use thermocap::sensor::SyntheticSensor;
//! use std::time::Duration;
//!
//! let pipeline = Pipeline::builder()
//!     .sample_period(Duration::from_millis(500))
//!     .zoom(8)
//!     .start(SyntheticSensor::new(0));
//!
//! pipeline.start_recording("ir.csv", "ir.avi").unwrap();
//! std::thread::sleep(Duration::from_secs(5));
//! let summary = pipeline.stop_recording().unwrap();
//! println!("recorded {} frames", summary.rows_written);
//! pipeline.shutdown().unwrap();
//! ```

use crate::cache::LatestFrameCache;
use crate::colormap::Colormap;
use crate::frame::ThermalFrame;
use crate::queue::RecordingQueue;
use crate::render::HeatmapRenderer;
use crate::sensor::{FrameProcessor, ThermalSensor};
use crate::session::{RecordingSession, RecordingSummary, SessionOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Recording control errors, surfaced synchronously to the caller. A failed
/// call mutates no pipeline state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start_recording` while a session is already active.
    #[error("a recording session is already active")]
    RecordingActive,
    /// `stop_recording` with no active session.
    #[error("no recording session is active")]
    RecordingNotActive,
    /// A sink could not be opened at session start.
    #[error("failed to open recording sink: {0}")]
    ResourceUnavailable(#[source] io::Error),
    /// A sink could not be flushed or finalized at session stop.
    #[error("failed to finalize recording sink: {0}")]
    Io(#[from] io::Error),
}

/// Monotonic counters kept by the two workers.
#[derive(Debug, Default)]
struct PipelineStats {
    frames_read: AtomicU64,
    read_errors: AtomicU64,
    frames_recorded: AtomicU64,
    writer_errors: AtomicU64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    /// Frames successfully acquired from the sensor.
    pub frames_read: u64,
    /// Failed sensor reads (each one cost a backoff sleep).
    pub read_errors: u64,
    /// Frames fully persisted (CSV row + video frame).
    pub frames_recorded: u64,
    /// Writer iterations that failed and were skipped.
    pub writer_errors: u64,
}

/// Pipeline construction parameters.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    sample_period: Duration,
    read_backoff: Duration,
    zoom: usize,
    colormap: Colormap,
    session_options: SessionOptions,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        PipelineBuilder {
            // MLX90640 at 2 Hz.
            sample_period: Duration::from_millis(500),
            read_backoff: Duration::from_millis(100),
            zoom: 8,
            colormap: Colormap::Inferno,
            session_options: SessionOptions::default(),
        }
    }
}

impl PipelineBuilder {
    /// Nominal time between sensor reads.
    pub fn sample_period(mut self, period: Duration) -> Self {
        self.sample_period = period;
        self
    }

    /// Sleep after a failed sensor read before retrying.
    pub fn read_backoff(mut self, backoff: Duration) -> Self {
        self.read_backoff = backoff;
        self
    }

    /// Integer upscale factor for rendered heatmaps.
    pub fn zoom(mut self, zoom: usize) -> Self {
        self.zoom = zoom;
        self
    }

    /// Default colormap for rendered heatmaps.
    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    /// Temperature bounds and encoding parameters used by sessions.
    pub fn session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Spawn the reader and writer threads over `sensor` and return the
    /// running pipeline.
    pub fn start<S>(self, sensor: S) -> Pipeline
    where
        S: ThermalSensor + Send + 'static,
    {
        self.start_with_processor(sensor, None)
    }

    /// Like [`PipelineBuilder::start`], with a downstream frame processor
    /// the writer forwards every recorded frame to.
    pub fn start_with_processor<S>(
        self,
        sensor: S,
        processor: Option<Box<dyn FrameProcessor + Send>>,
    ) -> Pipeline
    where
        S: ThermalSensor + Send + 'static,
    {
        let cache = Arc::new(LatestFrameCache::new());
        let queue = Arc::new(RecordingQueue::new());
        let recording = Arc::new(AtomicBool::new(false));
        let session: Arc<Mutex<Option<RecordingSession>>> = Arc::new(Mutex::new(None));
        let renderer = Arc::new(HeatmapRenderer::with_colormap(self.zoom, self.colormap));
        let stats = Arc::new(PipelineStats::default());
        let cancel = CancellationToken::new();

        let reader = spawn_reader(ReaderContext {
            sensor,
            cache: Arc::clone(&cache),
            queue: Arc::clone(&queue),
            recording: Arc::clone(&recording),
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
            period: self.sample_period,
            backoff: self.read_backoff,
        });
        let writer = spawn_writer(WriterContext {
            queue: Arc::clone(&queue),
            session: Arc::clone(&session),
            renderer: Arc::clone(&renderer),
            stats: Arc::clone(&stats),
            processor,
        });

        Pipeline {
            cache,
            queue,
            recording,
            session,
            renderer,
            stats,
            cancel,
            session_options: self.session_options,
            reader: Some(reader),
            writer: Some(writer),
        }
    }
}

struct ReaderContext<S> {
    sensor: S,
    cache: Arc<LatestFrameCache>,
    queue: Arc<RecordingQueue>,
    recording: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    period: Duration,
    backoff: Duration,
}

fn spawn_reader<S>(mut ctx: ReaderContext<S>) -> JoinHandle<()>
where
    S: ThermalSensor + Send + 'static,
{
    std::thread::Builder::new()
        .name("thermocap-reader".into())
        .spawn(move || {
            info!("frame reader started");
            let mut previous = Instant::now();
            while !ctx.cancel.is_cancelled() {
                let started = Instant::now();
                match ctx.sensor.read_frame() {
                    Ok(data) => {
                        let frame = ThermalFrame::new(data, unix_now());
                        debug!(
                            "new frame acquired, gap {} ms",
                            previous.elapsed().as_millis()
                        );
                        previous = Instant::now();
                        ctx.stats.frames_read.fetch_add(1, Ordering::Relaxed);

                        ctx.cache.publish(frame.clone());
                        if ctx.recording.load(Ordering::Acquire) {
                            ctx.queue.push(frame);
                        }
                    }
                    Err(e) => {
                        warn!("sensor read failed: {}", e);
                        ctx.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                        std::thread::sleep(ctx.backoff);
                        continue;
                    }
                }
                // Pace to the nominal period; a slow read eats its slack.
                if let Some(remaining) = ctx.period.checked_sub(started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
            info!("frame reader stopped");
        })
        .expect("failed to spawn reader thread")
}

struct WriterContext {
    queue: Arc<RecordingQueue>,
    session: Arc<Mutex<Option<RecordingSession>>>,
    renderer: Arc<HeatmapRenderer>,
    stats: Arc<PipelineStats>,
    processor: Option<Box<dyn FrameProcessor + Send>>,
}

fn spawn_writer(mut ctx: WriterContext) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("thermocap-writer".into())
        .spawn(move || {
            info!("frame writer started");
            while let Some(frame) = ctx.queue.pop_blocking() {
                let outcome = {
                    let mut slot = ctx.session.lock().unwrap();
                    match slot.as_mut() {
                        Some(session) => Some(session.write_frame(
                            &frame,
                            &ctx.renderer,
                            ctx.processor.as_deref_mut(),
                        )),
                        // stop_recording raced a frame that was already
                        // queued; nothing to write it to.
                        None => None,
                    }
                };
                match outcome {
                    Some(Ok(())) => {
                        ctx.stats.frames_recorded.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(Err(e)) => {
                        warn!("frame writing iteration error: {}", e);
                        ctx.stats.writer_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    None => debug!("dropping frame queued after session close"),
                }
                // Always, so drain_wait observes progress even on failure.
                ctx.queue.task_done();
            }
            info!("frame writer stopped");
        })
        .expect("failed to spawn writer thread")
}

/// Handle to the running acquisition/recording pipeline.
pub struct Pipeline {
    cache: Arc<LatestFrameCache>,
    queue: Arc<RecordingQueue>,
    recording: Arc<AtomicBool>,
    session: Arc<Mutex<Option<RecordingSession>>>,
    renderer: Arc<HeatmapRenderer>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    session_options: SessionOptions,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Builder with the default MLX90640-ish configuration.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Independent copy of the most recently acquired frame, or `None`
    /// before the first successful read.
    pub fn snapshot(&self) -> Option<ThermalFrame> {
        self.cache.snapshot()
    }

    /// The shared renderer, for on-demand re-rendering (e.g. per HTTP
    /// request) with caller-chosen bounds.
    pub fn renderer(&self) -> Arc<HeatmapRenderer> {
        Arc::clone(&self.renderer)
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_read: self.stats.frames_read.load(Ordering::Relaxed),
            read_errors: self.stats.read_errors.load(Ordering::Relaxed),
            frames_recorded: self.stats.frames_recorded.load(Ordering::Relaxed),
            writer_errors: self.stats.writer_errors.load(Ordering::Relaxed),
        }
    }

    /// True while a recording session is active.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Open both sinks and begin recording every acquired frame.
    ///
    /// The recording flag flips only after both sinks are open, so a failed
    /// start leaves no partial session behind.
    pub fn start_recording<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        csv_path: P,
        avi_path: Q,
    ) -> Result<(), PipelineError> {
        let mut slot = self.session.lock().unwrap();
        if slot.is_some() {
            return Err(PipelineError::RecordingActive);
        }

        let session = RecordingSession::open(
            csv_path,
            avi_path,
            &self.renderer,
            self.session_options,
        )
        .map_err(PipelineError::ResourceUnavailable)?;

        *slot = Some(session);
        drop(slot);
        self.recording.store(true, Ordering::Release);
        info!("recording started");
        Ok(())
    }

    /// Stop the active session: flag off first, drain the queue, then
    /// finalize and close both sinks. Blocks until the writer has processed
    /// everything that was queued at the moment the flag flipped.
    pub fn stop_recording(&self) -> Result<RecordingSummary, PipelineError> {
        if self.session.lock().unwrap().is_none() {
            return Err(PipelineError::RecordingNotActive);
        }

        self.recording.store(false, Ordering::Release);
        self.queue.drain_wait();

        let session = self
            .session
            .lock()
            .unwrap()
            .take()
            // Two concurrent stops can both pass the first check; the loser
            // finds the slot empty here.
            .ok_or(PipelineError::RecordingNotActive)?;
        let summary = session.finish()?;
        info!(
            "recording stopped: {} rows, {} video frames",
            summary.rows_written, summary.video_frames
        );
        Ok(summary)
    }

    /// Cooperative teardown: stop any active session, cancel the reader,
    /// close the queue, and join both threads. The handle is consumed; the
    /// workers otherwise run for the process lifetime.
    pub fn shutdown(mut self) -> Result<(), PipelineError> {
        info!("pipeline shutting down");
        match self.stop_recording() {
            Ok(_) | Err(PipelineError::RecordingNotActive) => {}
            Err(e) => warn!("failed to stop recording during shutdown: {}", e),
        }

        self.cancel.cancel();
        self.queue.close();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        info!("pipeline shut down");
        Ok(())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}
