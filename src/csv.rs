//! CSV trace sink and reader.
//!
//! One recording session writes one trace: a `no, timestamp, data_array`
//! header followed by one row per frame — session-local sequence number,
//! capture timestamp, then all 768 temperatures row-major at two decimal
//! places. Each row is formatted into a single buffer and written with one
//! call, so a row either lands in the file whole or not at all and write
//! failures surface on the row that caused them.
//!
//! The reader half parses a trace back into records; downstream tooling
//! (labeling, training) consumes recordings through it.

use crate::frame::{ThermalFrame, PIXEL_COUNT};
use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Exact header line, matching the trace format consumed downstream.
pub const CSV_HEADER: &str = "no, timestamp, data_array";

/// Append-only CSV sink for one recording session.
pub struct CsvSink {
    writer: Box<dyn Write + Send>,
}

impl CsvSink {
    /// Create the trace file and write the header row.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(Box::new(file))
    }

    /// Wrap an arbitrary writer (used by tests to inject failures).
    pub fn from_writer(writer: Box<dyn Write + Send>) -> io::Result<Self> {
        let mut sink = CsvSink { writer };
        sink.writer.write_all(CSV_HEADER.as_bytes())?;
        sink.writer.write_all(b"\n")?;
        Ok(sink)
    }

    /// Append one data row. The row is staged in memory first; on error
    /// nothing partial reaches the sink.
    pub fn write_row(&mut self, sequence: u64, frame: &ThermalFrame) -> io::Result<()> {
        // ~7 bytes per value plus the prefix.
        let mut row = String::with_capacity(PIXEL_COUNT * 7 + 32);
        let _ = write!(row, "{},{:.6}", sequence, frame.timestamp);
        for v in &frame.data {
            let _ = write!(row, ",{:.2}", v);
        }
        row.push('\n');
        self.writer.write_all(row.as_bytes())
    }

    /// Flush buffered bytes to the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One parsed trace row.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    /// Session-local sequence number.
    pub no: u64,
    /// Capture timestamp, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Row-major temperatures, °C.
    pub values: Vec<f32>,
}

impl TraceRecord {
    /// Rebuild a [`ThermalFrame`] from this record. Values carry the trace's
    /// two-decimal precision, not the original float bits.
    pub fn to_frame(&self) -> Result<ThermalFrame> {
        let data: [f32; PIXEL_COUNT] = self
            .values
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("record has {} values, expected {}", self.values.len(), PIXEL_COUNT))?;
        Ok(ThermalFrame::new(data, self.timestamp))
    }
}

/// Read and parse a recorded trace file.
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening trace {}", path.display()))?;
    parse_trace(BufReader::new(file))
}

/// Parse a trace from any buffered reader.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => bail!("empty trace: missing header"),
    };
    if header.trim() != CSV_HEADER {
        bail!("unexpected trace header: {:?}", header);
    }

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');

        let no: u64 = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .with_context(|| format!("row {}: bad sequence number", idx))?;
        let timestamp: f64 = fields
            .next()
            .and_then(|s| s.trim().parse().ok())
            .with_context(|| format!("row {}: bad timestamp", idx))?;

        let values = fields
            .map(|s| s.trim().parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("row {}: bad temperature value", idx))?;
        if values.len() != PIXEL_COUNT {
            bail!("row {}: {} values, expected {}", idx, values.len(), PIXEL_COUNT);
        }

        records.push(TraceRecord {
            no,
            timestamp,
            values,
        });
    }

    Ok(records)
}
