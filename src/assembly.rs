//! Bevy wiring: spawn the slice assembly, rebuild it when settings change,
//! and swap in an illustration texture once it loads.
//!
//! Scene composition stays with the application. These systems only own
//! the entities and mesh assets they create: a rebuild removes the previous
//! root entity *and* its mesh assets before spawning the replacement, so GPU
//! buffers do not pile up while a slider is dragged.

use std::f32::consts::FRAC_PI_2;

use bevy::{asset::LoadState, prelude::*};

use crate::slice::{SliceConfig, SliceConfigError, build_slice_assembly};

/// The live-editable shape. Replace or mutate it to trigger a rebuild.
#[derive(Resource, Clone, Debug, Default)]
pub struct PieSettings {
    pub slices: SliceConfig,
}

/// Materials shared by every slice.
#[derive(Resource, Clone, Debug)]
pub struct PieMaterials {
    pub top: Handle<StandardMaterial>,
    pub side: Handle<StandardMaterial>,
}

/// Root of a spawned assembly. Owns the mesh assets of all its slices.
#[derive(Component, Debug)]
pub struct PieAssembly {
    meshes: Vec<Handle<Mesh>>,
}

/// Per-slice metadata, on the parent of each slice's two mesh entities.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct PieSlice {
    pub index: usize,
    pub angular_midpoint: f32,
    pub fortune_label: String,
    pub has_marker: bool,
}

/// Slices are built Z-up; this turns the assembly into Bevy's Y-up frame.
pub fn z_up_to_y_up() -> Transform {
    Transform::from_rotation(Quat::from_rotation_x(-FRAC_PI_2))
}

/// Build and spawn a full assembly, returning its root entity.
pub fn spawn_slice_assembly(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    config: &SliceConfig,
    materials: &PieMaterials,
) -> Result<Entity, SliceConfigError> {
    let assembly = build_slice_assembly(config, materials.top.clone(), materials.side.clone())?;
    let mut owned = Vec::with_capacity(assembly.slices.len() * 2);
    let root = commands
        .spawn((z_up_to_y_up(), Visibility::default()))
        .id();

    for slice in assembly.slices {
        let top = meshes.add(slice.wedge.top.to_mesh());
        let side = meshes.add(slice.wedge.side.to_mesh());
        owned.push(top.clone());
        owned.push(side.clone());

        let tag = PieSlice {
            index: slice.index,
            angular_midpoint: slice.angular_midpoint,
            fortune_label: slice.fortune_label,
            has_marker: slice.has_marker,
        };
        let (top_material, side_material) = (
            assembly.top_material.clone(),
            assembly.side_material.clone(),
        );
        commands.entity(root).with_children(|pie| {
            pie.spawn((tag, Transform::default(), Visibility::default()))
                .with_children(|parts| {
                    parts.spawn((Mesh3d(top), MeshMaterial3d(top_material)));
                    parts.spawn((Mesh3d(side), MeshMaterial3d(side_material)));
                });
        });
    }

    commands.entity(root).insert(PieAssembly { meshes: owned });
    Ok(root)
}

/// Bevy system: rebuild the assembly whenever [`PieSettings`] or
/// [`PieMaterials`] change.
///
/// An invalid config is logged and the current assembly stays on screen.
pub fn rebuild_pie_on_change(
    mut commands: Commands,
    settings: Res<PieSettings>,
    materials: Option<Res<PieMaterials>>,
    mut meshes: ResMut<Assets<Mesh>>,
    existing: Query<(Entity, &PieAssembly)>,
) {
    let Some(materials) = materials else {
        return;
    };
    if !settings.is_changed() && !materials.is_changed() {
        return;
    }
    if let Err(e) = settings.slices.validate() {
        error!("Pie rebuild skipped, invalid slice config: {e}");
        return;
    }

    for (entity, assembly) in &existing {
        for handle in &assembly.meshes {
            meshes.remove(handle);
        }
        commands.entity(entity).despawn();
    }

    match spawn_slice_assembly(&mut commands, &mut meshes, &settings.slices, &materials) {
        Ok(root) => debug!(
            "Rebuilt pie {root:?} with {} slices",
            settings.slices.slice_count
        ),
        Err(e) => error!("Pie rebuild failed: {e}"),
    }
}

/// Load progress of an optional illustration texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IllustrationStatus {
    /// No illustration was requested.
    Missing,
    Loading,
    Loaded,
    Failed,
}

impl From<&LoadState> for IllustrationStatus {
    fn from(state: &LoadState) -> Self {
        match state {
            LoadState::Loaded => IllustrationStatus::Loaded,
            LoadState::Failed(_) => IllustrationStatus::Failed,
            _ => IllustrationStatus::Loading,
        }
    }
}

/// Which texture the top material should show, or `None` to keep waiting.
pub fn choose_top_texture<H: Clone>(
    status: IllustrationStatus,
    illustration: Option<&H>,
    synthetic: &H,
) -> Option<H> {
    match (status, illustration) {
        (IllustrationStatus::Loading, Some(_)) => None,
        (IllustrationStatus::Loaded, Some(baked)) => Some(baked.clone()),
        _ => Some(synthetic.clone()),
    }
}

/// A baked illustration for the pie top, with the synthetic colour map to
/// fall back on.
#[derive(Resource, Debug)]
pub struct IllustrationTexture {
    pub illustration: Option<Handle<Image>>,
    pub synthetic: Handle<Image>,
    resolved: bool,
}

impl IllustrationTexture {
    pub fn new(illustration: Option<Handle<Image>>, synthetic: Handle<Image>) -> Self {
        Self {
            illustration,
            synthetic,
            resolved: false,
        }
    }

    /// `true` once the top material has received its final texture.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Bevy system: point the top material at the illustration once it has
/// loaded, or at the synthetic map if it never will.
pub fn apply_illustration_fallback(
    illustration: Option<ResMut<IllustrationTexture>>,
    asset_server: Res<AssetServer>,
    images: Res<Assets<Image>>,
    pie: Option<Res<PieMaterials>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let (Some(mut illustration), Some(pie)) = (illustration, pie) else {
        return;
    };
    if illustration.resolved {
        return;
    }

    let status = match &illustration.illustration {
        // Images added directly to `Assets` never pass through the server.
        Some(handle) if images.contains(handle) => IllustrationStatus::Loaded,
        Some(handle) => IllustrationStatus::from(&asset_server.load_state(handle.id())),
        None => IllustrationStatus::Missing,
    };
    let Some(texture) = choose_top_texture(
        status,
        illustration.illustration.as_ref(),
        &illustration.synthetic,
    ) else {
        return;
    };

    if status == IllustrationStatus::Failed {
        warn!("Pie illustration failed to load, using the synthetic surface map");
    }
    if let Some(mut top) = materials.get_mut(&pie.top) {
        top.base_color_texture = Some(texture);
    }
    illustration.resolved = true;
}
