//! Fixed-size pool of rising vapor particles.
//!
//! State is struct-of-arrays, allocated once in [`AmbientParticles::new`].
//! Each tick a particle either keeps rising or, once its age passes 1 or it
//! climbs above `max_height`, is respawned in the same slot at the emitter
//! disk. Neither [`AmbientParticles::update`] nor
//! [`AmbientParticles::write_to_mesh`] allocates.
//!
//! Each particle is drawn as a sprite-textured quad of its own size, four
//! vertices per slot, turned toward the camera every frame.

use std::f32::consts::{PI, TAU};

use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology, VertexAttributeValues},
    prelude::*,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Emitter and motion tuning.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VaporConfig {
    /// Radius of the horizontal spawn disk.
    pub emitter_radius: f32,
    /// Y of the spawn disk.
    pub base_height: f32,
    /// Particles above this Y are respawned.
    pub max_height: f32,
    /// Upward speed range `[min, max]`.
    pub rise_speed: [f32; 2],
    /// Maximum horizontal drift speed.
    pub lateral_speed: f32,
    /// Age gained per second; `1 / age_rate` is the lifetime.
    pub age_rate: f32,
    /// Horizontal sway speed in units per second. Each tick adds
    /// `sin(age · sway_frequency + index) · sway_amplitude · dt` to x and z.
    pub sway_amplitude: f32,
    /// Sway cycles per unit of age, in radians.
    pub sway_frequency: f32,
    /// Quad side length range `[min, max]`, in world units.
    pub size_range: [f32; 2],
    /// Peak opacity, reached halfway through a particle's life.
    pub max_alpha: f32,
}

impl Default for VaporConfig {
    fn default() -> Self {
        Self {
            emitter_radius: 0.6,
            base_height: 0.3,
            max_height: 2.2,
            rise_speed: [0.25, 0.55],
            lateral_speed: 0.06,
            age_rate: 0.35,
            sway_amplitude: 0.05,
            sway_frequency: 6.0,
            size_range: [0.04, 0.12],
            max_alpha: 0.35,
        }
    }
}

/// The particle pool. Attach it next to the billboard [`Mesh3d`] from
/// [`AmbientParticles::to_mesh`] and [`advance_ambient_particles`] keeps the
/// mesh in sync.
#[derive(Component)]
pub struct AmbientParticles {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    ages: Vec<f32>,
    sizes: Vec<f32>,
    config: VaporConfig,
    rng: StdRng,
}

impl AmbientParticles {
    /// A pool of `count` particles seeded from the thread RNG.
    pub fn new(count: usize, config: VaporConfig) -> Self {
        Self::from_rng(count, config, StdRng::from_rng(&mut rand::rng()))
    }

    /// A reproducible pool.
    pub fn with_seed(count: usize, config: VaporConfig, seed: u64) -> Self {
        Self::from_rng(count, config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(count: usize, config: VaporConfig, rng: StdRng) -> Self {
        let mut pool = Self {
            positions: vec![Vec3::ZERO; count],
            velocities: vec![Vec3::ZERO; count],
            ages: vec![0.0; count],
            sizes: vec![0.0; count],
            config,
            rng,
        };
        // Stagger start ages so the column is already full on the first frame.
        for i in 0..count {
            pool.spawn(i);
            let age: f32 = pool.rng.random();
            pool.ages[i] = age;
            if pool.config.age_rate > 0.0 {
                pool.positions[i] += pool.velocities[i] * (age / pool.config.age_rate);
            }
            if pool.is_expired(i) {
                pool.spawn(i);
            }
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Normalised ages in `[0, 1]`.
    pub fn ages(&self) -> &[f32] {
        &self.ages
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn config(&self) -> &VaporConfig {
        &self.config
    }

    /// Opacity of particle `i`: fades in, peaks mid-life, fades out.
    pub fn alpha(&self, i: usize) -> f32 {
        (self.ages[i] * PI).sin().max(0.0) * self.config.max_alpha
    }

    /// Advance every particle by `dt` seconds. Negative or NaN `dt` is a no-op.
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let (rate, freq, sway) = (
            self.config.age_rate,
            self.config.sway_frequency,
            self.config.sway_amplitude,
        );
        for i in 0..self.ages.len() {
            self.ages[i] += dt * rate;
            self.positions[i] += self.velocities[i] * dt;

            let phase = self.ages[i] * freq + i as f32;
            self.positions[i].x += phase.sin() * sway * dt;
            self.positions[i].z += phase.sin() * sway * dt;

            if self.is_expired(i) {
                self.spawn(i);
            }
        }
    }

    fn is_expired(&self, i: usize) -> bool {
        self.ages[i] > 1.0 || self.positions[i].y > self.config.max_height
    }

    /// Re-enter the spawn state in place.
    fn spawn(&mut self, i: usize) {
        let c = &self.config;
        let r = c.emitter_radius * self.rng.random::<f32>().sqrt();
        let theta = self.rng.random::<f32>() * TAU;
        self.positions[i] = Vec3::new(r * theta.cos(), c.base_height, r * theta.sin());

        let [lo, hi] = c.rise_speed;
        let rise = if hi > lo && lo.is_finite() && hi.is_finite() {
            self.rng.random_range(lo..hi)
        } else {
            lo
        };
        let drift = |rng: &mut StdRng| (rng.random::<f32>() * 2.0 - 1.0) * c.lateral_speed;
        self.velocities[i] = Vec3::new(drift(&mut self.rng), rise, drift(&mut self.rng));

        let [smin, smax] = c.size_range;
        self.sizes[i] = if smax > smin && smin.is_finite() && smax.is_finite() {
            self.rng.random_range(smin..smax)
        } else {
            smin
        };
        self.ages[i] = 0.0;
    }

    /// Corners of particle `i`'s quad, facing along `basis`.
    fn quad_corners(&self, i: usize, basis: &BillboardBasis) -> [Vec3; 4] {
        let centre = self.positions[i];
        let half = self.sizes[i] * 0.5;
        let (right, up) = (basis.right * half, basis.up * half);
        [
            centre - right - up,
            centre + right - up,
            centre + right + up,
            centre - right + up,
        ]
    }

    /// A billboard mesh: one `size × size` quad per particle, four vertices
    /// per slot, textured corner to corner with the sprite.
    pub fn to_mesh(&self, basis: &BillboardBasis) -> Mesh {
        let n = self.len();
        let mut positions = Vec::with_capacity(n * 4);
        let mut colors = Vec::with_capacity(n * 4);
        let mut uvs = Vec::with_capacity(n * 4);
        let mut indices = Vec::with_capacity(n * 6);
        for i in 0..n {
            positions.extend(self.quad_corners(i, basis).map(|c| c.to_array()));
            colors.extend([[1.0, 1.0, 1.0, self.alpha(i)]; 4]);
            uvs.extend(QUAD_UVS);
            let base = (i * 4) as u32;
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        let normals = vec![basis.facing().to_array(); n * 4];

        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
            .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
            .with_inserted_attribute(Mesh::ATTRIBUTE_COLOR, colors)
            .with_inserted_indices(Indices::U32(indices))
    }

    /// Rewrite quad corners, normals and fade colours in place.
    ///
    /// Attributes whose length or format do not match the pool are left alone.
    pub fn write_to_mesh(&self, mesh: &mut Mesh, basis: &BillboardBasis) {
        let vertices = self.len() * 4;
        if let Some(VertexAttributeValues::Float32x3(values)) =
            mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION)
            && values.len() == vertices
        {
            for (i, quad) in values.chunks_exact_mut(4).enumerate() {
                for (dst, corner) in quad.iter_mut().zip(self.quad_corners(i, basis)) {
                    *dst = corner.to_array();
                }
            }
        }
        if let Some(VertexAttributeValues::Float32x3(values)) =
            mesh.attribute_mut(Mesh::ATTRIBUTE_NORMAL)
            && values.len() == vertices
        {
            values.fill(basis.facing().to_array());
        }
        if let Some(VertexAttributeValues::Float32x4(values)) =
            mesh.attribute_mut(Mesh::ATTRIBUTE_COLOR)
            && values.len() == vertices
        {
            for (i, quad) in values.chunks_exact_mut(4).enumerate() {
                let alpha = self.alpha(i);
                for dst in quad {
                    dst[3] = alpha;
                }
            }
        }
    }
}

const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// The plane particle quads are laid out in, in the pool's local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BillboardBasis {
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for BillboardBasis {
    /// Facing +Z, as seen by a camera looking down -Z.
    fn default() -> Self {
        Self {
            right: Vec3::X,
            up: Vec3::Y,
        }
    }
}

impl BillboardBasis {
    /// Face a camera, expressed in the space of an emitter with rotation
    /// `emitter`.
    pub fn facing_camera(camera: &GlobalTransform, emitter: Quat) -> Self {
        let to_local = emitter.inverse();
        Self {
            right: to_local * *camera.right(),
            up: to_local * *camera.up(),
        }
    }

    /// Normal of the quads, pointing at the viewer.
    pub fn facing(&self) -> Vec3 {
        self.right.cross(self.up).normalize_or(Vec3::Z)
    }
}

/// Build a particle pool and the drawable that shows it.
///
/// Spawn the returned tuple as one entity; `sprite` becomes the quad
/// material's texture when given.
pub fn create_ambient_particles(
    count: usize,
    sprite: Option<Handle<Image>>,
    config: VaporConfig,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) -> (
    AmbientParticles,
    Mesh3d,
    MeshMaterial3d<StandardMaterial>,
) {
    let particles = AmbientParticles::new(count, config);
    let mesh = meshes.add(particles.to_mesh(&BillboardBasis::default()));
    let material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        base_color_texture: sprite,
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        double_sided: true,
        cull_mode: None,
        ..Default::default()
    });
    (particles, Mesh3d(mesh), MeshMaterial3d(material))
}

/// Bevy system: tick every pool and turn its quads toward the first 3D
/// camera before writing them into the mesh.
pub fn advance_ambient_particles(
    time: Res<Time>,
    mut meshes: ResMut<Assets<Mesh>>,
    cameras: Query<&GlobalTransform, With<Camera3d>>,
    mut pools: Query<(&mut AmbientParticles, &Mesh3d, Option<&GlobalTransform>)>,
) {
    let dt = time.delta_secs();
    let camera = cameras.iter().next();
    for (mut particles, mesh, emitter) in &mut pools {
        particles.update(dt);
        let basis = match camera {
            Some(camera) => BillboardBasis::facing_camera(
                camera,
                emitter.map_or(Quat::IDENTITY, |t| t.compute_transform().rotation),
            ),
            None => BillboardBasis::default(),
        };
        if let Some(mut mesh) = meshes.get_mut(&mesh.0) {
            particles.write_to_mesh(&mut mesh, &basis);
        }
    }
}
