//! Perceptual colormaps for heatmap rendering.
//!
//! Each colormap is expanded once into a 256-entry RGB lookup table that maps
//! an 8-bit normalized intensity to a color. The Inferno and Viridis tables
//! are rebuilt here from sparse anchor points of the matplotlib originals by
//! linear interpolation — visually indistinguishable at video resolution and
//! far smaller than embedding the full tables.

/// Available temperature-to-color mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    /// Black → purple → orange → yellow. The default for thermal footage.
    #[default]
    Inferno,
    /// Purple → teal → yellow.
    Viridis,
    /// Plain intensity ramp, useful for debugging the normalization step.
    Grayscale,
}

/// Inferno sampled at 0.0, 0.1, …, 1.0.
const INFERNO_ANCHORS: [[u8; 3]; 11] = [
    [0, 0, 4],
    [22, 11, 57],
    [66, 10, 104],
    [106, 23, 110],
    [147, 38, 103],
    [188, 55, 84],
    [221, 81, 58],
    [243, 120, 25],
    [252, 165, 10],
    [246, 215, 70],
    [252, 255, 164],
];

/// Viridis sampled at 0.0, 0.1, …, 1.0.
const VIRIDIS_ANCHORS: [[u8; 3]; 11] = [
    [68, 1, 84],
    [72, 40, 120],
    [62, 74, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [109, 205, 89],
    [180, 222, 44],
    [223, 227, 24],
    [253, 231, 37],
];

impl Colormap {
    /// Expand this colormap into a full 256-entry RGB lookup table.
    pub fn build_lut(self) -> [[u8; 3]; 256] {
        match self {
            Colormap::Inferno => interpolate_anchors(&INFERNO_ANCHORS),
            Colormap::Viridis => interpolate_anchors(&VIRIDIS_ANCHORS),
            Colormap::Grayscale => {
                let mut lut = [[0u8; 3]; 256];
                for (i, entry) in lut.iter_mut().enumerate() {
                    *entry = [i as u8; 3];
                }
                lut
            }
        }
    }
}

fn interpolate_anchors(anchors: &[[u8; 3]]) -> [[u8; 3]; 256] {
    let mut lut = [[0u8; 3]; 256];
    let segments = (anchors.len() - 1) as f32;
    for (i, entry) in lut.iter_mut().enumerate() {
        let pos = i as f32 / 255.0 * segments;
        let seg = (pos as usize).min(anchors.len() - 2);
        let frac = pos - seg as f32;
        let lo = anchors[seg];
        let hi = anchors[seg + 1];
        for c in 0..3 {
            let v = lo[c] as f32 + (hi[c] as f32 - lo[c] as f32) * frac;
            entry[c] = v.round() as u8;
        }
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_is_identity_ramp() {
        let lut = Colormap::Grayscale.build_lut();
        assert_eq!(lut[0], [0, 0, 0]);
        assert_eq!(lut[128], [128, 128, 128]);
        assert_eq!(lut[255], [255, 255, 255]);
    }

    #[test]
    fn test_inferno_endpoints_match_anchors() {
        let lut = Colormap::Inferno.build_lut();
        assert_eq!(lut[0], [0, 0, 4]);
        assert_eq!(lut[255], [252, 255, 164]);
    }

    #[test]
    fn test_viridis_endpoints_match_anchors() {
        let lut = Colormap::Viridis.build_lut();
        assert_eq!(lut[0], [68, 1, 84]);
        assert_eq!(lut[255], [253, 231, 37]);
    }

    #[test]
    fn test_interpolation_is_monotonic_for_grayscale_red() {
        // Inferno's red channel climbs over the first half; spot-check a few
        // interpolated entries stay ordered.
        let lut = Colormap::Inferno.build_lut();
        assert!(lut[32][0] >= lut[0][0]);
        assert!(lut[64][0] >= lut[32][0]);
        assert!(lut[128][0] >= lut[64][0]);
    }
}
