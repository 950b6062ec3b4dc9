//! Two-colour noisy checkerboard, used for the backing plane under the pie.
//!
//! Cells alternate `color_a` / `color_b` on a `tiles_per_axis²` grid and every
//! pixel gets one uniform offset in `[-noise, +noise]` applied to all three
//! channels. The pattern tiles seamlessly only when the tile count is even
//! and divides the side length; upload it
//! with [`TextureRole::Color`](crate::upload::TextureRole::Color) to get the
//! repeat sampler.

use rand::Rng;

use crate::buffer::{PixelBuffer, TextureError, validate_dimensions};

/// Side length used by [`build_checker_texture`].
pub const DEFAULT_CHECKER_SIZE: u32 = 512;

/// Configures a checker raster.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CheckerConfig {
    /// First cell colour, sRGB bytes.
    pub color_a: [u8; 3],
    /// Second cell colour, sRGB bytes.
    pub color_b: [u8; 3],
    /// Cells per side. Zero is treated as one. Odd counts leave two
    /// same-coloured cells meeting at the wrap, and counts that do not
    /// divide `size` give cells that differ by a texel.
    pub tiles_per_axis: u32,
    /// Side length in texels.
    pub size: u32,
    /// Per-pixel noise amplitude in byte levels.
    pub noise: u8,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            color_a: [214, 204, 186],
            color_b: [158, 64, 52],
            tiles_per_axis: 8,
            size: DEFAULT_CHECKER_SIZE,
            noise: 10,
        }
    }
}

impl CheckerConfig {
    /// Render with the given RNG.
    pub fn build_with_rng<R: Rng>(&self, rng: &mut R) -> Result<PixelBuffer, TextureError> {
        validate_dimensions(self.size, self.size)?;
        Ok(render(self, rng))
    }
}

/// Square `DEFAULT_CHECKER_SIZE` checker with ±10 levels of noise.
///
/// Tiles seamlessly for even `tiles_per_axis` that divide 512 (2, 4, 8, …);
/// other counts are drawn as given, with a visible seam at the wrap.
pub fn build_checker_texture(color_a: [u8; 3], color_b: [u8; 3], tiles_per_axis: u32) -> PixelBuffer {
    let config = CheckerConfig {
        color_a,
        color_b,
        tiles_per_axis,
        ..CheckerConfig::default()
    };
    render(&config, &mut rand::rng())
}

fn render<R: Rng>(config: &CheckerConfig, rng: &mut R) -> PixelBuffer {
    let size = config.size as usize;
    let tiles = config.tiles_per_axis.max(1) as usize;
    let amp = config.noise as i16;
    let mut data = vec![0u8; size * size * 4];

    for y in 0..size {
        let row_cell = y * tiles / size;
        for x in 0..size {
            let col_cell = x * tiles / size;
            let base = if (row_cell + col_cell) % 2 == 0 {
                config.color_a
            } else {
                config.color_b
            };
            let offset = if amp > 0 {
                rng.random_range(-amp..=amp)
            } else {
                0
            };
            let i = (y * size + x) * 4;
            for c in 0..3 {
                data[i + c] = (base[c] as i16 + offset).clamp(0, 255) as u8;
            }
            data[i + 3] = 255;
        }
    }

    PixelBuffer::from_rgba(config.size, config.size, data)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn within(px: [u8; 4], color: [u8; 3], amp: i32) -> bool {
        (0..3).all(|c| (px[c] as i32 - color[c] as i32).abs() <= amp)
    }

    #[test]
    fn cells_alternate_within_noise_band() {
        let config = CheckerConfig {
            size: 64,
            tiles_per_axis: 4,
            ..CheckerConfig::default()
        };
        let buf = config
            .build_with_rng(&mut StdRng::seed_from_u64(3))
            .expect("valid size");
        // Cell (0,0) is colour A, cell (1,0) is colour B, cell (1,1) is A again.
        assert!(within(buf.pixel(5, 5), config.color_a, 10));
        assert!(within(buf.pixel(16 + 5, 5), config.color_b, 10));
        assert!(within(buf.pixel(16 + 5, 16 + 5), config.color_a, 10));
    }

    #[test]
    fn even_tile_count_wraps_seamlessly() {
        let config = CheckerConfig {
            size: 32,
            tiles_per_axis: 4,
            noise: 0,
            ..CheckerConfig::default()
        };
        let buf = config
            .build_with_rng(&mut StdRng::seed_from_u64(0))
            .expect("valid size");
        // Last column and first column belong to different cells.
        assert_ne!(buf.pixel(31, 0), buf.pixel(0, 0));
        assert_eq!(buf.pixel(31, 0), buf.pixel(8, 0));
    }

    #[test]
    fn odd_tile_count_repeats_a_colour_at_the_wrap() {
        let config = CheckerConfig {
            size: 30,
            tiles_per_axis: 3,
            noise: 0,
            ..CheckerConfig::default()
        };
        let buf = config
            .build_with_rng(&mut StdRng::seed_from_u64(0))
            .expect("valid size");
        assert_eq!(buf.pixel(29, 0), buf.pixel(0, 0));
    }

    #[test]
    fn zero_tiles_is_a_single_cell() {
        let config = CheckerConfig {
            size: 16,
            tiles_per_axis: 0,
            noise: 0,
            ..CheckerConfig::default()
        };
        let buf = config
            .build_with_rng(&mut StdRng::seed_from_u64(0))
            .expect("valid size");
        assert!(buf.as_bytes().chunks_exact(4).all(|px| px[..3] == config.color_a));
    }

    #[test]
    fn convenience_builder_is_square() {
        let buf = build_checker_texture([255, 255, 255], [0, 0, 0], 8);
        assert_eq!(buf.width(), DEFAULT_CHECKER_SIZE);
        assert_eq!(buf.height(), DEFAULT_CHECKER_SIZE);
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = CheckerConfig {
            size: 0,
            ..CheckerConfig::default()
        };
        assert!(config.build_with_rng(&mut StdRng::seed_from_u64(0)).is_err());
    }
}
