//! `bevy_fortune_pie` — procedural sliced-pie geometry, surface textures and
//! ambient vapor for Bevy.
//!
//! # Architecture
//! The builders are plain functions of immutable config values:
//!  - [`build_slice_assembly`] turns a [`SliceConfig`] into deformed wedge
//!    meshes with polar / cylindrical UVs.
//!  - [`build_surface_maps`] synthesizes colour, height, roughness and AO
//!    rasters from one shared grayscale field.
//!  - [`build_normal_map_from_height`] derives a tangent-space normal map.
//!  - [`build_checker_texture`] makes a tileable noisy checkerboard.
//!  - [`AmbientParticles`] is a fixed-size pool of rising vapor, drawn as
//!    camera-facing sprite quads.
//!
//! [`FortunePiePlugin`] wires them into an app: editing [`PieSettings`]
//! rebuilds the pie, and particle pools tick every frame.

pub mod assembly;
pub mod buffer;
pub mod checker;
pub mod geometry;
pub mod normal;
pub mod particles;
pub mod slice;
pub mod surface;
pub mod upload;

pub use assembly::{IllustrationTexture, PieMaterials, PieSettings, PieSlice};
pub use buffer::{PixelBuffer, TextureError};
pub use checker::{CheckerConfig, build_checker_texture};
pub use normal::{NormalConfig, build_normal_map_from_height};
pub use particles::{AmbientParticles, BillboardBasis, VaporConfig, create_ambient_particles};
pub use slice::{SliceConfig, SliceConfigError, build_slice_assembly};
pub use surface::{SurfaceConfig, SurfaceMapSet, build_surface_maps};
pub use upload::TextureRole;

use bevy::prelude::*;

/// Bevy plugin — registers the rebuild, illustration-fallback and particle systems.
pub struct FortunePiePlugin;

impl Plugin for FortunePiePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PieSettings>().add_systems(
            Update,
            (
                assembly::rebuild_pie_on_change,
                assembly::apply_illustration_fallback,
                particles::advance_ambient_particles,
            ),
        );
    }
}
