//! Derive a tangent-space normal map from a height raster.
//!
//! Central differences on the red channel: `dx = h(right) - h(left)`,
//! `dy = h(down) - h(up)`. Border pixels reuse the nearest in-bounds
//! neighbour (clamp), so edge texels fall back to a one-sided difference.
//! The vector `(dx·strength, dy·strength, depth)` is normalised and stored as
//!   R = X, G = Y, B = Z, A = 255
//! with each component remapped from `[-1, 1]` to `[0, 255]`. A flat height
//! field therefore encodes as `(128, 128, 255)`, the `(0.5, 0.5, 1.0)` reference.

use rayon::prelude::*;

use crate::buffer::PixelBuffer;

/// Tuning for [`build_normal_map_from_height`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NormalConfig {
    /// Gradient multiplier `k`. Larger values tilt the normals further.
    pub strength: f32,
    /// Fixed Z component before normalisation.
    pub depth: f32,
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self {
            strength: 4.0,
            depth: 1.0,
        }
    }
}

/// Build a normal raster the same size as `height`, reading height from red.
pub fn build_normal_map_from_height(height: &PixelBuffer, config: &NormalConfig) -> PixelBuffer {
    let samples = height.channel_samples(0);
    let data = normals_from_samples(&samples, height.width(), height.height(), config);
    PixelBuffer::from_rgba(height.width(), height.height(), data)
}

/// Same as [`build_normal_map_from_height`] but over an `f32` arena in `[0, 1]`.
pub(crate) fn normals_from_samples(
    heights: &[f32],
    width: u32,
    height: u32,
    config: &NormalConfig,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; w * h * 4];
    if w == 0 || h == 0 {
        return out;
    }

    out.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(h - 1);
        for x in 0..w {
            let left = x.saturating_sub(1);
            let right = (x + 1).min(w - 1);

            let dx = heights[y * w + right] - heights[y * w + left];
            let dy = heights[down * w + x] - heights[up * w + x];

            let (nx, ny, nz) = (dx * config.strength, dy * config.strength, config.depth);
            let len = (nx * nx + ny * ny + nz * nz).sqrt().max(1e-6);

            let px = &mut row[x * 4..x * 4 + 4];
            px[0] = encode_normal(nx / len);
            px[1] = encode_normal(ny / len);
            px[2] = encode_normal(nz / len);
            px[3] = 255;
        }
    });

    out
}

#[inline]
fn encode_normal(n: f32) -> u8 {
    ((n * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_height_gives_reference_normal() {
        for level in [0u8, 97, 255] {
            let flat = PixelBuffer::solid(16, 16, [level, level, level, 255]).expect("valid");
            let normals = build_normal_map_from_height(&flat, &NormalConfig::default());
            assert_eq!(normals.width(), 16);
            assert_eq!(normals.height(), 16);
            assert!(
                normals
                    .as_bytes()
                    .chunks_exact(4)
                    .all(|px| px == [128, 128, 255, 255]),
                "flat field at level {level} produced a tilted normal"
            );
        }
    }

    #[test]
    fn rising_ramp_tilts_toward_positive_x() {
        let w = 8u32;
        let samples: Vec<f32> = (0..w * w).map(|i| (i % w) as f32 / w as f32).collect();
        let ramp = PixelBuffer::from_gray(w, w, &samples);
        let normals = build_normal_map_from_height(&ramp, &NormalConfig::default());
        let [r, g, b, _] = normals.pixel(4, 4);
        assert!(r > 128, "x gradient not encoded: r={r}");
        assert_eq!(g, 128);
        assert!(b < 255);
    }

    #[test]
    fn border_pixels_use_one_sided_difference() {
        // Single bright column on the left edge; the edge pixel must see it
        // through the clamped left neighbour instead of wrapping around.
        let w = 4u32;
        let samples: Vec<f32> = (0..w * w)
            .map(|i| if i % w == 0 { 1.0 } else { 0.0 })
            .collect();
        let normals = normals_from_samples(&samples, w, w, &NormalConfig::default());
        let right_edge = &normals[(w as usize - 1) * 4..w as usize * 4];
        assert_eq!(right_edge[0], 128, "right edge must not wrap to the left column");
        assert!(normals[0] < 128, "left edge should slope down to the right");
    }
}
