//! Correlated colour / height / roughness / AO rasters for the pie top.
//!
//! The algorithm:
//!  1. Fill an `f32` arena with mid-gray.
//!  2. Stamp a multi-arm spiral of soft-edged creases (darker) with raised
//!     layers between them. Arm phase is wobbled by seeded FBM so the layout
//!     looks baked rather than drawn, yet depends only on the config.
//!  3. Add per-pixel jitter from the caller's RNG and push the result through
//!     a contrast tone curve. This is the shared grayscale intermediate.
//!  4. Derive colour (three warm luminance bands plus burnt / dusting
//!     speckles), roughness (inverse of gray) and AO (box-blurred gray).
//!
//! All four maps come from the same intermediate, so creases line up across
//! colour, shading and occlusion.

use std::f32::consts::{PI, TAU};

use bevy::{
    asset::{Assets, Handle},
    image::Image,
    pbr::StandardMaterial,
};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rand::Rng;
use rayon::prelude::*;

use crate::{
    buffer::{PixelBuffer, TextureError, lerp, linear_to_srgb, validate_dimensions},
    normal::{NormalConfig, build_normal_map_from_height},
    upload::TextureRole,
};

/// Inner radius of the spiral in UV units; the very centre stays smooth.
const SPIRAL_INNER: f32 = 0.04;
/// Outer radius of the spiral in UV units.
const SPIRAL_OUTER: f32 = 0.48;
/// Spatial frequency of the FBM phase wobble (cycles per texture).
const WOBBLE_FREQ: f64 = 3.0;

/// Upper edges of the dark-crust and mid-tone luminance bands.
const DARK_BAND: f32 = 0.35;
const MID_BAND: f32 = 0.70;

// Linear-RGB gradient endpoints per band.
const CRUST: [[f32; 3]; 2] = [[0.16, 0.07, 0.025], [0.33, 0.15, 0.05]];
const WARM: [[f32; 3]; 2] = [[0.45, 0.22, 0.07], [0.72, 0.42, 0.14]];
const HIGHLIGHT: [[f32; 3]; 2] = [[0.80, 0.55, 0.22], [0.93, 0.78, 0.45]];
const DUSTING: [f32; 3] = [0.92, 0.90, 0.86];
const BURNT_SCALE: f32 = 0.35;

/// Configures [`build_surface_maps`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SurfaceConfig {
    /// Side length of every output raster.
    pub size: u32,
    /// Seed for the crease wobble. Same seed, same crease layout.
    pub seed: u32,
    /// Turns each spiral arm makes from the inner to the outer radius.
    pub spiral_turns: f32,
    /// Number of interleaved spiral arms (strokes).
    pub spiral_arms: u32,
    /// Crease core width in UV units.
    pub stroke_width: f32,
    /// Soft falloff added on each side of the core, in UV units.
    pub stroke_blur: f32,
    /// How far a crease darkens the mid-gray base.
    pub stroke_depth: f32,
    /// Crease phase distortion, as a fraction of the arm spacing.
    pub wobble: f32,
    /// Per-pixel grayscale jitter amplitude. Non-finite values disable it.
    pub jitter: f32,
    /// Per-channel colour jitter amplitude (linear). Non-finite values
    /// disable it.
    pub color_jitter: f32,
    /// Probability of a darker burnt speckle per pixel.
    pub burnt_chance: f32,
    /// Probability of a near-white dusting speckle per pixel.
    pub dusting_chance: f32,
    /// Box-blur radius (texels) for the AO map.
    pub ao_radius: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            size: 512,
            seed: 11,
            spiral_turns: 4.5,
            spiral_arms: 3,
            stroke_width: 0.012,
            stroke_blur: 0.010,
            stroke_depth: 0.30,
            wobble: 0.12,
            jitter: 0.05,
            color_jitter: 0.025,
            burnt_chance: 0.012,
            dusting_chance: 0.003,
            ao_radius: 6,
        }
    }
}

/// The four correlated rasters. All share one size.
#[derive(Clone, Debug)]
pub struct SurfaceMapSet {
    pub color: PixelBuffer,
    pub height: PixelBuffer,
    pub roughness: PixelBuffer,
    pub ao: PixelBuffer,
}

impl SurfaceMapSet {
    /// Pack AO (R), roughness (G) and metallic = 0 (B) for `StandardMaterial`.
    pub fn packed_orm(&self) -> PixelBuffer {
        let data = self
            .ao
            .as_bytes()
            .chunks_exact(4)
            .zip(self.roughness.as_bytes().chunks_exact(4))
            .flat_map(|(ao, rough)| [ao[0], rough[0], 0, 255])
            .collect();
        PixelBuffer::from_rgba(self.ao.width(), self.ao.height(), data)
    }

    /// Derive normals from the height map and upload everything.
    pub fn into_images(self, normal: &NormalConfig, images: &mut Assets<Image>) -> SurfaceHandles {
        let normal_map = build_normal_map_from_height(&self.height, normal);
        let orm = self.packed_orm();
        SurfaceHandles {
            color: images.add(self.color.into_image(TextureRole::Color)),
            normal: images.add(normal_map.into_image(TextureRole::Normal)),
            orm: images.add(orm.into_image(TextureRole::Data)),
            height: images.add(self.height.into_image(TextureRole::Data)),
        }
    }
}

/// Image handles for an uploaded [`SurfaceMapSet`].
#[derive(Clone, Debug)]
pub struct SurfaceHandles {
    pub color: Handle<Image>,
    pub normal: Handle<Image>,
    /// Occlusion (R) / roughness (G) / metallic (B).
    pub orm: Handle<Image>,
    pub height: Handle<Image>,
}

impl SurfaceHandles {
    /// A fully textured top material.
    pub fn top_material(&self) -> StandardMaterial {
        StandardMaterial {
            base_color_texture: Some(self.color.clone()),
            normal_map_texture: Some(self.normal.clone()),
            metallic_roughness_texture: Some(self.orm.clone()),
            occlusion_texture: Some(self.orm.clone()),
            perceptual_roughness: 1.0,
            metallic: 0.0,
            ..Default::default()
        }
    }
}

/// Build the map set, drawing per-pixel noise from the thread RNG.
pub fn build_surface_maps(config: &SurfaceConfig) -> Result<SurfaceMapSet, TextureError> {
    build_surface_maps_with_rng(config, &mut rand::rng())
}

/// Build the map set with an explicit RNG for the per-pixel noise.
pub fn build_surface_maps_with_rng<R: Rng>(
    config: &SurfaceConfig,
    rng: &mut R,
) -> Result<SurfaceMapSet, TextureError> {
    validate_dimensions(config.size, config.size)?;
    let size = config.size;

    let mut gray = crease_field(config);
    for v in gray.iter_mut() {
        let noise = if config.jitter > 0.0 && config.jitter.is_finite() {
            rng.random_range(-config.jitter..=config.jitter)
        } else {
            0.0
        };
        *v = tone_curve(*v + noise);
    }

    let mut color = vec![0u8; gray.len() * 4];
    for (px, &v) in color.chunks_exact_mut(4).zip(&gray) {
        let rgb = speckle(band_color(v), config, rng);
        for c in 0..3 {
            let cj = if config.color_jitter > 0.0 && config.color_jitter.is_finite() {
                rng.random_range(-config.color_jitter..=config.color_jitter)
            } else {
                0.0
            };
            px[c] = linear_to_srgb(rgb[c] + cj);
        }
        px[3] = 255;
    }

    let roughness: Vec<f32> = gray.iter().map(|&v| roughness_from_gray(v)).collect();
    let ao = box_blur(&gray, size as usize, config.ao_radius as usize);

    Ok(SurfaceMapSet {
        color: PixelBuffer::from_rgba(size, size, color),
        height: PixelBuffer::from_gray(size, size, &gray),
        roughness: PixelBuffer::from_gray(size, size, &roughness),
        ao: PixelBuffer::from_gray(size, size, &ao),
    })
}

/// The deterministic base field: mid-gray with soft spiral creases.
pub(crate) fn crease_field(config: &SurfaceConfig) -> Vec<f32> {
    let size = config.size as usize;
    let fbm: Fbm<Perlin> = Fbm::new(config.seed).set_octaves(4);
    let arms = config.spiral_arms.max(1);
    let turns = config.spiral_turns.max(f32::EPSILON);
    let pitch = (SPIRAL_OUTER - SPIRAL_INNER) / turns;
    let half_width = config.stroke_width * 0.5;
    let blur = config.stroke_blur.max(1e-4);

    let mut field = vec![0.5f32; size * size];
    for (i, v) in field.iter_mut().enumerate() {
        let u = ((i % size) as f32 + 0.5) / size as f32;
        let w = ((i / size) as f32 + 0.5) / size as f32;
        let (dx, dy) = (u - 0.5, w - 0.5);
        let r = (dx * dx + dy * dy).sqrt();

        let mask = smoothstep(SPIRAL_INNER - blur, SPIRAL_INNER, r)
            * (1.0 - smoothstep(SPIRAL_OUTER, SPIRAL_OUTER + blur, r));
        if mask <= 0.0 {
            continue;
        }

        let angle = dy.atan2(dx).rem_euclid(TAU);
        let wobble =
            fbm.get([u as f64 * WOBBLE_FREQ, w as f64 * WOBBLE_FREQ]) as f32 * config.wobble;

        // Distance (UV units) to the nearest crease across all arms.
        let mut nearest = f32::MAX;
        for arm in 0..arms {
            let offset = arm as f32 / arms as f32;
            let phase = (r - SPIRAL_INNER) / pitch - angle / TAU - offset + wobble;
            let d = (phase - phase.round()).abs() * pitch;
            nearest = nearest.min(d);
        }

        let crease = 1.0 - smoothstep(half_width, half_width + blur, nearest);
        let layer_lift = config.stroke_depth * 0.4 * (1.0 - crease);
        *v += (layer_lift - config.stroke_depth * crease) * mask;
    }
    field
}

/// Contrast boost: the mid band is pulled down, bright values pushed up.
/// Continuous and monotonic over `[0, 1]`.
pub(crate) fn tone_curve(v: f32) -> f32 {
    let out = if v <= 0.3 {
        v
    } else if v <= 0.65 {
        v - 0.1 * (PI * (v - 0.3) / 0.35).sin()
    } else {
        0.65 + (v - 0.65) * 1.6
    };
    out.clamp(0.0, 1.0)
}

/// Warm three-band palette indexed by luminance.
fn band_color(v: f32) -> [f32; 3] {
    let (stops, t) = if v < DARK_BAND {
        (CRUST, v / DARK_BAND)
    } else if v < MID_BAND {
        (WARM, (v - DARK_BAND) / (MID_BAND - DARK_BAND))
    } else {
        (HIGHLIGHT, (v - MID_BAND) / (1.0 - MID_BAND))
    };
    [
        lerp(stops[0][0], stops[1][0], t),
        lerp(stops[0][1], stops[1][1], t),
        lerp(stops[0][2], stops[1][2], t),
    ]
}

fn speckle<R: Rng>(rgb: [f32; 3], config: &SurfaceConfig, rng: &mut R) -> [f32; 3] {
    let roll: f32 = rng.random();
    if roll < config.dusting_chance {
        DUSTING
    } else if roll < config.dusting_chance + config.burnt_chance {
        rgb.map(|c| c * BURNT_SCALE)
    } else {
        rgb
    }
}

/// Darker regions are rougher.
#[inline]
fn roughness_from_gray(v: f32) -> f32 {
    0.95 - 0.55 * v.clamp(0.0, 1.0)
}

/// Separable box blur with clamped edges.
pub(crate) fn box_blur(src: &[f32], size: usize, radius: usize) -> Vec<f32> {
    if radius == 0 || size == 0 {
        return src.to_vec();
    }
    let span = (2 * radius + 1) as f32;
    let clamp = |i: isize| i.clamp(0, size as isize - 1) as usize;

    let mut horizontal = vec![0.0f32; src.len()];
    horizontal
        .par_chunks_mut(size)
        .enumerate()
        .for_each(|(y, row)| {
            let line = &src[y * size..(y + 1) * size];
            for (x, out) in row.iter_mut().enumerate() {
                let sum: f32 = (-(radius as isize)..=radius as isize)
                    .map(|k| line[clamp(x as isize + k)])
                    .sum();
                *out = sum / span;
            }
        });

    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(size).enumerate().for_each(|(y, row)| {
        for (x, px) in row.iter_mut().enumerate() {
            let sum: f32 = (-(radius as isize)..=radius as isize)
                .map(|k| horizontal[clamp(y as isize + k) * size + x])
                .sum();
            *px = sum / span;
        }
    });
    out
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn small() -> SurfaceConfig {
        SurfaceConfig {
            size: 64,
            ..SurfaceConfig::default()
        }
    }

    #[test]
    fn all_maps_share_square_dimensions() {
        let maps = build_surface_maps(&small()).expect("valid size");
        for buf in [&maps.color, &maps.height, &maps.roughness, &maps.ao] {
            assert_eq!(buf.width(), 64);
            assert_eq!(buf.height(), 64);
            assert_eq!(buf.as_bytes().len(), 64 * 64 * 4);
        }
    }

    #[test]
    fn crease_layout_is_reproducible_noise_is_not() {
        let config = small();
        assert_eq!(crease_field(&config), crease_field(&config));

        let a = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(1))
            .expect("valid size");
        let b = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(2))
            .expect("valid size");
        assert_ne!(a.height, b.height, "per-pixel jitter should differ");
        assert_ne!(a.color, b.color);
    }

    #[test]
    fn without_jitter_height_depends_only_on_config() {
        let config = SurfaceConfig {
            jitter: 0.0,
            ..small()
        };
        let a = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(1))
            .expect("valid size");
        let b = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(99))
            .expect("valid size");
        assert_eq!(a.height, b.height);
        assert_eq!(a.roughness, b.roughness);
        assert_eq!(a.ao, b.ao);
    }

    #[test]
    fn creases_are_darker_than_the_base() {
        let config = small();
        let field = crease_field(&config);
        let min = field.iter().cloned().fold(f32::MAX, f32::min);
        let max = field.iter().cloned().fold(f32::MIN, f32::max);
        assert!(min < 0.3, "no crease drawn (min={min})");
        assert!(max > 0.55, "no raised layer drawn (max={max})");
    }

    #[test]
    fn roughness_is_inverse_of_gray() {
        let config = SurfaceConfig {
            jitter: 0.0,
            ..small()
        };
        let maps = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(5))
            .expect("valid size");
        let h = maps.height.as_bytes();
        let r = maps.roughness.as_bytes();
        for i in (0..h.len()).step_by(4 * 97) {
            for j in (0..h.len()).step_by(4 * 89) {
                if h[i] < h[j] {
                    assert!(r[i] >= r[j], "darker texel must not be smoother");
                }
            }
        }
    }

    #[test]
    fn non_finite_jitter_is_ignored() {
        let config = SurfaceConfig {
            jitter: f32::INFINITY,
            color_jitter: f32::NAN,
            ..small()
        };
        let calm = SurfaceConfig {
            jitter: 0.0,
            ..small()
        };
        let maps = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(2))
            .expect("valid size");
        let reference = build_surface_maps_with_rng(&calm, &mut StdRng::seed_from_u64(2))
            .expect("valid size");
        assert_eq!(maps.height, reference.height);
    }

    #[test]
    fn tone_curve_is_monotonic_and_shapes_bands() {
        let mut prev = tone_curve(0.0);
        for i in 1..=1000 {
            let v = tone_curve(i as f32 / 1000.0);
            assert!(v >= prev - 1e-6, "tone curve decreased at {i}");
            prev = v;
        }
        assert!(tone_curve(0.5) < 0.5);
        assert!(tone_curve(0.8) > 0.8);
        assert_eq!(tone_curve(0.2), 0.2);
    }

    #[test]
    fn ao_is_smoother_than_height() {
        let config = small();
        let maps = build_surface_maps_with_rng(&config, &mut StdRng::seed_from_u64(8))
            .expect("valid size");
        let roughness_of = |buf: &PixelBuffer| -> u64 {
            buf.as_bytes()
                .chunks_exact(4)
                .collect::<Vec<_>>()
                .windows(2)
                .map(|w| (w[0][0] as i64 - w[1][0] as i64).unsigned_abs())
                .sum()
        };
        assert!(roughness_of(&maps.ao) < roughness_of(&maps.height));
    }

    #[test]
    fn box_blur_preserves_constant_field() {
        let src = vec![0.25f32; 16 * 16];
        let out = box_blur(&src, 16, 3);
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn orm_packs_ao_and_roughness_channels() {
        let maps = build_surface_maps(&small()).expect("valid size");
        let orm = maps.packed_orm();
        let px = orm.pixel(10, 20);
        assert_eq!(px[0], maps.ao.pixel(10, 20)[0]);
        assert_eq!(px[1], maps.roughness.pixel(10, 20)[0]);
        assert_eq!(px[2], 0);
    }

    #[test]
    fn oversized_request_is_rejected() {
        let config = SurfaceConfig {
            size: crate::buffer::MAX_DIMENSION + 1,
            ..SurfaceConfig::default()
        };
        assert!(build_surface_maps(&config).is_err());
    }

    #[test]
    fn config_serializes() {
        let json = serde_json::to_string(&SurfaceConfig::default()).expect("serialize");
        let back: SurfaceConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.spiral_arms, SurfaceConfig::default().spiral_arms);
    }
}
