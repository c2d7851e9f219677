//! thermocap - thermal sensor acquisition and recording pipeline.
//!
//! Continuously samples a low-resolution (24×32) thermal sensor, keeps the
//! most recent frame available to concurrent readers, and on demand records
//! time-ordered traces as CSV plus a rendered MJPEG-AVI heatmap video —
//! without ever stalling acquisition on disk or encode latency.
//!
//! # Architecture
//!
//! ```text
//! sensor ──> reader thread ──> LatestFrameCache (always)
//!                        └───> RecordingQueue (while a session is active)
//!                                    │
//!                              writer thread ──> ir.csv
//!                                          ├──> ir.avi (MJPEG heatmaps)
//!                                          └──> optional FrameProcessor
//! ```
//!
//! Start the two workers once with [`pipeline::Pipeline::builder`], then
//! start/stop recording sessions as often as needed; `stop_recording`
//! drains the queue before closing the sinks, so recordings are complete
//! and ordered. [`batch::BatchCollector`] layers the on-disk directory
//! scheme for repeated batches on top.

pub mod avi;
pub mod batch;
pub mod cache;
pub mod colormap;
pub mod csv;
pub mod frame;
pub mod pipeline;
pub mod queue;
pub mod render;
pub mod sensor;
pub mod session;

pub use batch::BatchCollector;
pub use cache::LatestFrameCache;
pub use colormap::Colormap;
pub use frame::{ThermalFrame, PIXEL_COUNT, SENSOR_COLS, SENSOR_ROWS};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineError, StatsSnapshot};
pub use queue::RecordingQueue;
pub use render::{ChannelOrder, HeatmapRenderer, RenderError, RenderOptions, RenderedFrame};
pub use sensor::{FrameProcessor, SensorError, SyntheticSensor, ThermalSensor};
pub use session::{RecordingSummary, SessionOptions, WriterIterationError};
