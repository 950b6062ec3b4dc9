//! Turn [`PixelBuffer`]s into Bevy [`Image`] assets.
//!
//! All images get a repeat sampler and a full mip chain. The checker backing
//! plane relies on the wrap to tile; the surface maps are sampled only
//! inside `[0, 1]` by the disk projection, so the address mode does not
//! change how they look.

use bevy::{
    asset::RenderAssetUsages,
    image::{Image, ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor},
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

use crate::buffer::{PixelBuffer, linear_to_srgb, srgb_to_linear};

/// What a raster encodes, which decides its GPU format and mip filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRole {
    /// sRGB-encoded albedo. Mips are averaged in linear light.
    Color,
    /// Tangent-space normals. Mips are decoded, averaged and renormalised.
    Normal,
    /// Linear scalar data (height, roughness, AO, ORM). Plain byte average.
    Data,
}

impl TextureRole {
    fn format(self) -> TextureFormat {
        match self {
            TextureRole::Color => TextureFormat::Rgba8UnormSrgb,
            TextureRole::Normal | TextureRole::Data => TextureFormat::Rgba8Unorm,
        }
    }
}

impl PixelBuffer {
    /// Move the pixels into a mipmapped, repeat-wrapping [`Image`].
    pub fn into_image(self, role: TextureRole) -> Image {
        let (width, height) = (self.width(), self.height());
        let mut image = Image::new(
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            self.into_bytes(),
            role.format(),
            RenderAssetUsages::default(),
        );
        if let Some(base) = image.data.take() {
            let (chain, levels) = build_mip_chain(base, width, height, role);
            image.texture_descriptor.mip_level_count = levels;
            image.data = Some(chain);
        }
        image.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
            address_mode_u: ImageAddressMode::Repeat,
            address_mode_v: ImageAddressMode::Repeat,
            // wgpu requires all filters to be Linear when anisotropy_clamp > 1.
            mag_filter: ImageFilterMode::Linear,
            min_filter: ImageFilterMode::Linear,
            mipmap_filter: ImageFilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });
        image
    }
}

/// Append successively halved levels to `data` with a 2×2 box filter.
///
/// Odd sizes clamp the source block to the image edge. Returns the whole
/// chain and the level count (including level 0).
pub(crate) fn build_mip_chain(
    mut data: Vec<u8>,
    width: u32,
    height: u32,
    role: TextureRole,
) -> (Vec<u8>, u32) {
    let mut levels = 1u32;
    let (mut w, mut h) = (width as usize, height as usize);
    let mut src = 0usize;

    while w > 1 || h > 1 {
        let nw = w.max(2) / 2;
        let nh = h.max(2) / 2;
        let dst = data.len();
        data.resize(dst + nw * nh * 4, 0);

        for y in 0..nh {
            for x in 0..nw {
                let mut block = [[0u8; 4]; 4];
                let mut count = 0;
                for sy in (y * 2)..(y * 2 + 2).min(h) {
                    for sx in (x * 2)..(x * 2 + 2).min(w) {
                        let i = src + (sy * w + sx) * 4;
                        block[count].copy_from_slice(&data[i..i + 4]);
                        count += 1;
                    }
                }
                let avg = average(&block[..count], role);
                let o = dst + (y * nw + x) * 4;
                data[o..o + 4].copy_from_slice(&avg);
            }
        }

        src = dst;
        w = nw;
        h = nh;
        levels += 1;
    }

    (data, levels)
}

fn average(pixels: &[[u8; 4]], role: TextureRole) -> [u8; 4] {
    let n = pixels.len() as f32;
    let alpha = (pixels.iter().map(|p| p[3] as u32).sum::<u32>() / pixels.len() as u32) as u8;
    match role {
        TextureRole::Data => {
            let mut sum = [0u32; 4];
            for p in pixels {
                for (acc, &c) in sum.iter_mut().zip(p) {
                    *acc += c as u32;
                }
            }
            sum.map(|s| (s / pixels.len() as u32) as u8)
        }
        TextureRole::Color => {
            let mut rgb = [0.0f32; 3];
            for p in pixels {
                for c in 0..3 {
                    rgb[c] += srgb_to_linear(p[c]);
                }
            }
            [
                linear_to_srgb(rgb[0] / n),
                linear_to_srgb(rgb[1] / n),
                linear_to_srgb(rgb[2] / n),
                alpha,
            ]
        }
        TextureRole::Normal => {
            // Without renormalising, opposing normals average to a zero vector.
            let mut v = [0.0f32; 3];
            for p in pixels {
                for c in 0..3 {
                    v[c] += p[c] as f32 / 127.5 - 1.0;
                }
            }
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt().max(1e-6);
            let enc = |c: f32| ((c / len * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
            [enc(v[0]), enc(v[1]), enc(v[2]), 255]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_reaches_one_texel() {
        let base = vec![100u8; 8 * 4 * 4];
        let (chain, levels) = build_mip_chain(base, 8, 4, TextureRole::Data);
        // 8×4, 4×2, 2×1, 1×1
        assert_eq!(levels, 4);
        assert_eq!(chain.len(), (32 + 8 + 2 + 1) * 4);
        assert!(chain.iter().all(|&b| b == 100));
    }

    #[test]
    fn normal_mips_stay_unit_length() {
        // +X and -X tilted normals side by side must not collapse to black.
        let base = vec![255, 128, 128, 255, 0, 128, 128, 255];
        let (chain, _) = build_mip_chain(base, 2, 1, TextureRole::Normal);
        let top = &chain[8..12];
        assert!(top[2] > 200, "averaged normal lost its length: {top:?}");
    }

    #[test]
    fn image_keeps_format_per_role() {
        let buf = PixelBuffer::solid(4, 4, [10, 20, 30, 255]).expect("valid size");
        let image = buf.into_image(TextureRole::Color);
        assert_eq!(
            image.texture_descriptor.format,
            TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(image.texture_descriptor.mip_level_count, 3);
    }
}
