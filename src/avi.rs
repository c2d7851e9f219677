//! Minimal MJPEG-in-AVI (RIFF) muxer for heatmap video.
//!
//! Pure-Rust writer for the one container shape this crate produces: a
//! single `vids`/`MJPG` stream of JPEG frames at a fixed resolution and
//! frame rate. Frame and size counts are written as placeholders and
//! patched in [`AviWriter::finalize`], together with the `idx1` index, so a
//! finalized file plays in stock players.
//!
//! # File structure
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     'avih' (main header: frame period, counts, dimensions)
//!     LIST 'strl'
//!       'strh' (stream header: vids/MJPG, rate, length)
//!       'strf' (BITMAPINFOHEADER)
//!   LIST 'movi'
//!     '00dc' <jpeg> ...     (one chunk per frame, even-padded)
//!   'idx1' (one entry per frame)
//! ```

use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// Byte offsets of the placeholder fields patched at finalize time.
const RIFF_SIZE_POS: u64 = 4;
const AVIH_TOTAL_FRAMES_POS: u64 = 48;
const STRH_LENGTH_POS: u64 = 140;
const MOVI_SIZE_POS: u64 = 216;
/// Offset of the `movi` fourcc; index entries are relative to it.
const MOVI_START: u64 = 220;

/// Streaming AVI writer. Append JPEG frames, then `finalize` exactly once.
pub struct AviWriter<W: Write + Seek> {
    writer: W,
    frames_written: u32,
    /// (offset from `movi` fourcc, chunk data size) per frame, for `idx1`.
    index: Vec<(u32, u32)>,
    finalized: bool,
}

impl AviWriter<BufWriter<std::fs::File>> {
    /// Create the video file and write its headers.
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, fps: f64) -> io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Self::new(BufWriter::new(file), width, height, fps)
    }
}

impl<W: Write + Seek> AviWriter<W> {
    /// Write AVI headers to `writer`, leaving count fields as placeholders.
    pub fn new(mut writer: W, width: u32, height: u32, fps: f64) -> io::Result<Self> {
        assert!(fps > 0.0, "frame rate must be positive");

        let micros_per_frame = (1_000_000.0 / fps) as u32;
        // fps expressed as rate/scale to keep fractional rates exact enough.
        let scale = 1000u32;
        let rate = (fps * scale as f64).round() as u32;
        let buffer_size = width * height * 3;

        writer.write_all(b"RIFF")?;
        writer.write_all(&0u32.to_le_bytes())?; // riff size, patched
        writer.write_all(b"AVI ")?;

        // hdrl list: 'hdrl' + avih chunk + strl list = 4 + 64 + 124 bytes.
        writer.write_all(b"LIST")?;
        writer.write_all(&192u32.to_le_bytes())?;
        writer.write_all(b"hdrl")?;

        writer.write_all(b"avih")?;
        writer.write_all(&56u32.to_le_bytes())?;
        writer.write_all(&micros_per_frame.to_le_bytes())?;
        writer.write_all(&(buffer_size.saturating_mul(fps.ceil() as u32)).to_le_bytes())?; // max bytes/sec
        writer.write_all(&0u32.to_le_bytes())?; // padding granularity
        writer.write_all(&AVIF_HASINDEX.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // total frames, patched
        writer.write_all(&0u32.to_le_bytes())?; // initial frames
        writer.write_all(&1u32.to_le_bytes())?; // streams
        writer.write_all(&buffer_size.to_le_bytes())?; // suggested buffer size
        writer.write_all(&width.to_le_bytes())?;
        writer.write_all(&height.to_le_bytes())?;
        writer.write_all(&[0u8; 16])?; // reserved

        // strl list: 'strl' + strh chunk + strf chunk = 4 + 64 + 48 bytes.
        writer.write_all(b"LIST")?;
        writer.write_all(&116u32.to_le_bytes())?;
        writer.write_all(b"strl")?;

        writer.write_all(b"strh")?;
        writer.write_all(&56u32.to_le_bytes())?;
        writer.write_all(b"vids")?;
        writer.write_all(b"MJPG")?;
        writer.write_all(&0u32.to_le_bytes())?; // flags
        writer.write_all(&0u32.to_le_bytes())?; // priority + language
        writer.write_all(&0u32.to_le_bytes())?; // initial frames
        writer.write_all(&scale.to_le_bytes())?;
        writer.write_all(&rate.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // start
        writer.write_all(&0u32.to_le_bytes())?; // length in frames, patched
        writer.write_all(&buffer_size.to_le_bytes())?; // suggested buffer size
        writer.write_all(&u32::MAX.to_le_bytes())?; // quality: default
        writer.write_all(&0u32.to_le_bytes())?; // sample size
        writer.write_all(&0u16.to_le_bytes())?; // rcFrame left
        writer.write_all(&0u16.to_le_bytes())?; // rcFrame top
        writer.write_all(&(width as u16).to_le_bytes())?;
        writer.write_all(&(height as u16).to_le_bytes())?;

        writer.write_all(b"strf")?;
        writer.write_all(&40u32.to_le_bytes())?;
        writer.write_all(&40u32.to_le_bytes())?; // biSize
        writer.write_all(&(width as i32).to_le_bytes())?;
        writer.write_all(&(height as i32).to_le_bytes())?;
        writer.write_all(&1u16.to_le_bytes())?; // planes
        writer.write_all(&24u16.to_le_bytes())?; // bits per pixel
        writer.write_all(b"MJPG")?; // compression
        writer.write_all(&buffer_size.to_le_bytes())?; // image size
        writer.write_all(&[0u8; 16])?; // resolution + palette fields

        writer.write_all(b"LIST")?;
        writer.write_all(&0u32.to_le_bytes())?; // movi size, patched
        writer.write_all(b"movi")?;

        debug_assert_eq!(writer.stream_position()?, MOVI_START + 4);

        Ok(AviWriter {
            writer,
            frames_written: 0,
            index: Vec::new(),
            finalized: false,
        })
    }

    /// Number of frames appended so far.
    pub fn frame_count(&self) -> u32 {
        self.frames_written
    }

    /// Append one JPEG-encoded frame as a `00dc` chunk.
    pub fn write_frame(&mut self, jpeg: &[u8]) -> io::Result<()> {
        assert!(!self.finalized, "write_frame after finalize");

        let chunk_pos = self.writer.stream_position()?;
        self.writer.write_all(b"00dc")?;
        self.writer.write_all(&(jpeg.len() as u32).to_le_bytes())?;
        self.writer.write_all(jpeg)?;
        if jpeg.len() % 2 == 1 {
            self.writer.write_all(&[0u8])?; // RIFF chunks are even-aligned
        }

        self.index
            .push(((chunk_pos - MOVI_START) as u32, jpeg.len() as u32));
        self.frames_written += 1;
        Ok(())
    }

    /// Write the `idx1` index, patch all placeholder counts and sizes, and
    /// flush. The writer is unusable afterwards.
    pub fn finalize(&mut self) -> io::Result<()> {
        assert!(!self.finalized, "finalize called twice");
        self.finalized = true;

        let idx1_pos = self.writer.stream_position()?;
        self.writer.write_all(b"idx1")?;
        self.writer
            .write_all(&(self.index.len() as u32 * 16).to_le_bytes())?;
        for &(offset, size) in &self.index {
            self.writer.write_all(b"00dc")?;
            self.writer.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(&size.to_le_bytes())?;
        }
        let file_end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(RIFF_SIZE_POS))?;
        self.writer
            .write_all(&((file_end - 8) as u32).to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(AVIH_TOTAL_FRAMES_POS))?;
        self.writer.write_all(&self.frames_written.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(STRH_LENGTH_POS))?;
        self.writer.write_all(&self.frames_written.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(MOVI_SIZE_POS))?;
        self.writer
            .write_all(&((idx1_pos - MOVI_START) as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(file_end))?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn le_u32(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
    }

    fn finalized_bytes(frames: &[&[u8]]) -> Vec<u8> {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), 256, 192, 2.0).unwrap();
        for f in frames {
            writer.write_frame(f).unwrap();
        }
        writer.finalize().unwrap();
        writer.writer.into_inner()
    }

    #[test]
    fn test_header_fourccs_and_layout() {
        let buf = finalized_bytes(&[b"\xFF\xD8fake\xFF\xD9"]);
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(&buf[8..12], b"AVI ");
        assert_eq!(&buf[12..16], b"LIST");
        assert_eq!(&buf[20..24], b"hdrl");
        assert_eq!(&buf[24..28], b"avih");
        assert_eq!(&buf[100..104], b"strh");
        assert_eq!(&buf[108..112], b"vids");
        assert_eq!(&buf[112..116], b"MJPG");
        assert_eq!(&buf[164..168], b"strf");
        assert_eq!(&buf[MOVI_START as usize..MOVI_START as usize + 4], b"movi");
        assert_eq!(&buf[224..228], b"00dc");
    }

    #[test]
    fn test_counts_and_sizes_are_patched() {
        let frames: Vec<&[u8]> = vec![b"\xFF\xD8aa\xFF\xD9", b"\xFF\xD8bb\xFF\xD9", b"\xFF\xD8cc\xFF\xD9"];
        let buf = finalized_bytes(&frames);

        assert_eq!(le_u32(&buf, RIFF_SIZE_POS as usize), buf.len() as u32 - 8);
        assert_eq!(le_u32(&buf, AVIH_TOTAL_FRAMES_POS as usize), 3);
        assert_eq!(le_u32(&buf, STRH_LENGTH_POS as usize), 3);

        // movi size spans from its fourcc to the idx1 chunk.
        let movi_size = le_u32(&buf, MOVI_SIZE_POS as usize) as usize;
        let idx1_pos = MOVI_START as usize + movi_size;
        assert_eq!(&buf[idx1_pos..idx1_pos + 4], b"idx1");
        assert_eq!(le_u32(&buf, idx1_pos + 4), 3 * 16);
    }

    #[test]
    fn test_index_entries_point_at_chunks() {
        let frames: Vec<&[u8]> = vec![b"\xFF\xD8first\xFF\xD9", b"\xFF\xD8second!\xFF\xD9"];
        let buf = finalized_bytes(&frames);

        let movi_size = le_u32(&buf, MOVI_SIZE_POS as usize) as usize;
        let idx1_entries = MOVI_START as usize + movi_size + 8;

        for (i, frame) in frames.iter().enumerate() {
            let entry = idx1_entries + i * 16;
            assert_eq!(&buf[entry..entry + 4], b"00dc");
            assert_eq!(le_u32(&buf, entry + 4), AVIIF_KEYFRAME);
            let offset = le_u32(&buf, entry + 8) as usize;
            let size = le_u32(&buf, entry + 12) as usize;
            assert_eq!(size, frame.len());
            let chunk = MOVI_START as usize + offset;
            assert_eq!(&buf[chunk..chunk + 4], b"00dc");
            assert_eq!(&buf[chunk + 8..chunk + 8 + size], *frame);
        }
        // First chunk sits right after the movi fourcc.
        assert_eq!(le_u32(&buf, idx1_entries + 8), 4);
    }

    #[test]
    fn test_odd_chunks_are_even_padded() {
        let buf = finalized_bytes(&[b"\xFF\xD8x\xFF\xD9"]); // 5 bytes, odd
        let chunk_size = le_u32(&buf, 228) as usize;
        assert_eq!(chunk_size, 5);
        // Next structure (idx1) starts on an even boundary.
        let movi_size = le_u32(&buf, MOVI_SIZE_POS as usize) as usize;
        assert_eq!(movi_size % 2, 0);
    }

    #[test]
    fn test_empty_recording_finalizes() {
        let buf = finalized_bytes(&[]);
        assert_eq!(le_u32(&buf, AVIH_TOTAL_FRAMES_POS as usize), 0);
        let movi_size = le_u32(&buf, MOVI_SIZE_POS as usize) as usize;
        assert_eq!(movi_size, 4); // just the fourcc
    }
}
