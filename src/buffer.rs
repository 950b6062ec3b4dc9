//! Flat RGBA8 pixel buffers shared by every raster stage.
//!
//! A [`PixelBuffer`] is immutable once produced: synthesis stages read one
//! buffer (or an `f32` sample arena) and write a fresh one, so no stage ever
//! aliases another's output.

use std::sync::OnceLock;

/// Error returned when texture dimensions are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// Either `width` or `height` was zero, which is not a valid wgpu texture size.
    ZeroDimension { width: u32, height: u32 },
    /// One or both dimensions exceeded [`MAX_DIMENSION`].
    DimensionTooLarge { width: u32, height: u32, max: u32 },
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::ZeroDimension { width, height } => write!(
                f,
                "texture dimensions must be non-zero (got {width}×{height})"
            ),
            TextureError::DimensionTooLarge { width, height, max } => write!(
                f,
                "texture dimensions {width}×{height} exceed MAX_DIMENSION={max}"
            ),
        }
    }
}

impl std::error::Error for TextureError {}

/// Maximum allowed texture dimension (per side).
///
/// The surface synthesizer keeps three `f32` arenas alive next to four RGBA8
/// outputs; at 4096² that is already ~460 MB.
pub const MAX_DIMENSION: u32 = 4096;

/// Dimension guard for raster builders.
///
/// Returns an error for zero-sized textures (invalid wgpu resources) or
/// dimensions that exceed [`MAX_DIMENSION`].
#[inline]
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroDimension { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TextureError::DimensionTooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

/// Row-major RGBA8 raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing RGBA8 bytes. `data.len()` must equal `width * height * 4`.
    pub(crate) fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build an opaque grayscale buffer from samples in `[0, 1]`.
    pub(crate) fn from_gray(width: u32, height: u32, samples: &[f32]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 4);
        for &s in samples {
            let g = unit_to_u8(s);
            data.extend_from_slice(&[g, g, g, 255]);
        }
        Self::from_rgba(width, height, data)
    }

    /// Fill a buffer with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, TextureError> {
        validate_dimensions(width, height)?;
        let n = width as usize * height as usize;
        Ok(Self::from_rgba(width, height, rgba.repeat(n)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The RGBA value at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Byte offset of pixel `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Read one channel of every pixel as a normalised `[0, 1]` sample.
    pub fn channel_samples(&self, channel: usize) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|px| px[channel] as f32 / 255.0)
            .collect()
    }
}

/// Map a `[0, 1]` sample to a byte, clamping out-of-range values.
#[inline]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a linear-light `f32` in `[0, 1]` to an sRGB-encoded `u8`.
///
/// 4096-entry table built once: a 256-entry table leaves sRGB outputs 1–12
/// unreachable because the curve is steep near zero.
#[inline]
pub(crate) fn linear_to_srgb(linear: f32) -> u8 {
    const N: usize = 4096;
    static LUT: OnceLock<[u8; N]> = OnceLock::new();
    let lut = LUT.get_or_init(|| {
        std::array::from_fn(|i| {
            let c = i as f32 / (N - 1) as f32;
            let encoded = if c <= 0.003_130_8 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            };
            (encoded * 255.0).round() as u8
        })
    });
    lut[(linear.clamp(0.0, 1.0) * (N - 1) as f32).round() as usize]
}

/// Decode an sRGB `u8` to linear light.
pub(crate) fn srgb_to_linear(v: u8) -> f32 {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        std::array::from_fn(|i| {
            let c = i as f32 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        })
    })[v as usize]
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_oversized_dimensions() {
        assert_eq!(
            validate_dimensions(0, 16),
            Err(TextureError::ZeroDimension {
                width: 0,
                height: 16
            })
        );
        assert!(matches!(
            validate_dimensions(MAX_DIMENSION + 1, 16),
            Err(TextureError::DimensionTooLarge { .. })
        ));
        assert!(validate_dimensions(512, 512).is_ok());
    }

    #[test]
    fn gray_buffer_is_opaque_and_clamped() {
        let buf = PixelBuffer::from_gray(2, 1, &[-0.5, 2.0]);
        assert_eq!(buf.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(buf.pixel(1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn srgb_round_trip_is_close() {
        for v in [0u8, 13, 64, 128, 200, 255] {
            let back = linear_to_srgb(srgb_to_linear(v));
            assert!(
                (back as i32 - v as i32).abs() <= 1,
                "sRGB round trip drifted: {v} -> {back}"
            );
        }
    }
}
