//! Raw temperature matrix → color heatmap rendering.
//!
//! The render path is a fixed sequence: upscale the 24×32 readout with cubic
//! convolution, derive or accept temperature bounds, clip, normalize to
//! 0–255, then map through a colormap LUT into a 3-channel pixel buffer.
//! Bounds are derived from the *upscaled* matrix when the caller does not
//! supply them, so cubic overshoot at sharp edges participates in
//! auto-ranging. The renderer holds no mutable state; one instance can serve
//! the writer thread and any number of HTTP snapshot renderers concurrently.
//!
//! # Example
//!
//! ```rust
//! use thermocap::frame::{ThermalFrame, PIXEL_COUNT};
//! use thermocap::render::{HeatmapRenderer, RenderOptions};
//!
//! let renderer = HeatmapRenderer::new(8);
//! let frame = ThermalFrame::new([21.0; PIXEL_COUNT], 0.0);
//! let options = RenderOptions {
//!     min_temp: Some(18.0),
//!     max_temp: Some(35.0),
//!     ..Default::default()
//! };
//! let rendered = renderer.render(&frame, &options).unwrap();
//! assert_eq!((rendered.width, rendered.height), (32 * 8, 24 * 8));
//! ```

use crate::colormap::Colormap;
use crate::frame::{ThermalFrame, SENSOR_COLS, SENSOR_ROWS};
use anyhow::Result;
use thiserror::Error;

/// Errors from a single render call.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The effective temperature range is empty — normalization would divide
    /// by zero. Happens for constant frames under auto-ranging; callers must
    /// supply explicit bounds for those.
    #[error("degenerate temperature range: min {min} >= max {max}")]
    DegenerateRange { min: f32, max: f32 },
}

/// Channel layout of a rendered pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue; what JPEG encoding expects.
    #[default]
    Rgb,
    /// Blue, green, red, for encoders with OpenCV-style layout.
    Bgr,
}

/// Per-call rendering parameters.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Lower temperature bound in °C; derived from the upscaled matrix if `None`.
    pub min_temp: Option<f32>,
    /// Upper temperature bound in °C; derived from the upscaled matrix if `None`.
    pub max_temp: Option<f32>,
    /// Override the renderer's default colormap for this call.
    pub colormap: Option<Colormap>,
    /// Output channel order.
    pub order: ChannelOrder,
}

/// A color-mapped heatmap image, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data, row-major, 3 bytes per pixel in `order`.
    pub data: Vec<u8>,
    /// Channel layout of `data`.
    pub order: ChannelOrder,
}

impl RenderedFrame {
    /// Encode to JPEG bytes at the given quality (1–100).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        use image::{ImageBuffer, Rgb};

        let rgb = match self.order {
            ChannelOrder::Rgb => self.data.clone(),
            ChannelOrder::Bgr => {
                let mut swapped = self.data.clone();
                for px in swapped.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                swapped
            }
        };

        let img: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| anyhow::anyhow!("Failed to create image buffer"))?;

        let mut jpeg_data = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_data, quality);
        encoder.encode_image(&img)?;

        Ok(jpeg_data)
    }
}

/// Stateless heatmap renderer for a fixed integer zoom factor.
pub struct HeatmapRenderer {
    zoom: usize,
    colormap: Colormap,
    lut: [[u8; 3]; 256],
}

impl HeatmapRenderer {
    /// Create a renderer that upscales 24×32 readouts by `zoom` with the
    /// default Inferno colormap.
    pub fn new(zoom: usize) -> Self {
        Self::with_colormap(zoom, Colormap::default())
    }

    /// Create a renderer with an explicit default colormap.
    pub fn with_colormap(zoom: usize, colormap: Colormap) -> Self {
        assert!(zoom >= 1, "zoom factor must be at least 1");
        HeatmapRenderer {
            zoom,
            colormap,
            lut: colormap.build_lut(),
        }
    }

    /// Output width in pixels.
    pub fn output_width(&self) -> u32 {
        (SENSOR_COLS * self.zoom) as u32
    }

    /// Output height in pixels.
    pub fn output_height(&self) -> u32 {
        (SENSOR_ROWS * self.zoom) as u32
    }

    /// Render one frame to a color pixel buffer.
    ///
    /// Fails with [`RenderError::DegenerateRange`] when the effective bounds
    /// satisfy `max <= min` — notably for constant frames under auto-ranging.
    pub fn render(
        &self,
        frame: &ThermalFrame,
        options: &RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        let out_w = SENSOR_COLS * self.zoom;
        let out_h = SENSOR_ROWS * self.zoom;
        let upscaled = upscale_cubic(&frame.data, self.zoom);

        // Auto-range on the upscaled matrix, so interpolation overshoot is
        // part of the observed range.
        let min_temp = options
            .min_temp
            .unwrap_or_else(|| upscaled.iter().copied().fold(f32::INFINITY, f32::min));
        let max_temp = options
            .max_temp
            .unwrap_or_else(|| upscaled.iter().copied().fold(f32::NEG_INFINITY, f32::max));
        if max_temp <= min_temp {
            return Err(RenderError::DegenerateRange {
                min: min_temp,
                max: max_temp,
            });
        }

        let override_lut = match options.colormap {
            Some(cm) if cm != self.colormap => Some(cm.build_lut()),
            _ => None,
        };
        let lut = override_lut.as_ref().unwrap_or(&self.lut);

        let scale = 255.0 / (max_temp - min_temp);
        let mut data = Vec::with_capacity(out_w * out_h * 3);
        for &v in &upscaled {
            let clipped = v.clamp(min_temp, max_temp);
            // Truncating quantization, matching u8 cast semantics.
            let intensity = ((clipped - min_temp) * scale) as u8;
            let [r, g, b] = lut[intensity as usize];
            match options.order {
                ChannelOrder::Rgb => data.extend_from_slice(&[r, g, b]),
                ChannelOrder::Bgr => data.extend_from_slice(&[b, g, r]),
            }
        }

        Ok(RenderedFrame {
            width: out_w as u32,
            height: out_h as u32,
            data,
            order: options.order,
        })
    }
}

/// Keys cubic convolution kernel with a = −0.75 (the INTER_CUBIC kernel).
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t * t * t - (A + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        A * t * t * t - 5.0 * A * t * t + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

/// Upscale the 24×32 temperature matrix by an integer factor using cubic
/// convolution with clamped borders. Values are physical temperatures, so
/// this stays in f32 rather than going through an image-crate resize (those
/// assume normalized intensities).
fn upscale_cubic(src: &[f32], zoom: usize) -> Vec<f32> {
    let out_w = SENSOR_COLS * zoom;
    let out_h = SENSOR_ROWS * zoom;
    if zoom == 1 {
        return src.to_vec();
    }

    let mut out = vec![0.0f32; out_w * out_h];
    let inv = 1.0 / zoom as f32;

    for oy in 0..out_h {
        let sy = (oy as f32 + 0.5) * inv - 0.5;
        let iy = sy.floor() as isize;
        let fy = sy - iy as f32;
        let wy = [
            cubic_weight(fy + 1.0),
            cubic_weight(fy),
            cubic_weight(fy - 1.0),
            cubic_weight(fy - 2.0),
        ];

        for ox in 0..out_w {
            let sx = (ox as f32 + 0.5) * inv - 0.5;
            let ix = sx.floor() as isize;
            let fx = sx - ix as f32;
            let wx = [
                cubic_weight(fx + 1.0),
                cubic_weight(fx),
                cubic_weight(fx - 1.0),
                cubic_weight(fx - 2.0),
            ];

            let mut acc = 0.0f32;
            for (dy, &wyv) in wy.iter().enumerate() {
                let y = (iy + dy as isize - 1).clamp(0, SENSOR_ROWS as isize - 1) as usize;
                for (dx, &wxv) in wx.iter().enumerate() {
                    let x = (ix + dx as isize - 1).clamp(0, SENSOR_COLS as isize - 1) as usize;
                    acc += wyv * wxv * src[y * SENSOR_COLS + x];
                }
            }
            out[oy * out_w + ox] = acc;
        }
    }

    out
}
