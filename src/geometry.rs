//! Plain triangle-mesh data and its conversion into a Bevy [`Mesh`].
//!
//! Builders work on [`MeshData`] so the deformation and UV math stays
//! testable without an asset server; [`MeshData::to_mesh`] is the only place
//! that touches Bevy's mesh types.

use bevy::{
    asset::RenderAssetUsages,
    log::warn,
    math::{Vec2, Vec3},
    mesh::{Indices, Mesh, PrimitiveTopology},
};

/// Indexed triangle list with per-vertex normals and UVs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Append a vertex and return its index.
    pub(crate) fn push_vertex(&mut self, position: Vec3, uv: Vec2) -> u32 {
        let i = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(Vec3::ZERO);
        self.uvs.push(uv);
        i
    }

    pub(crate) fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Two triangles `a b c` / `a c d` for a counter-clockwise quad.
    pub(crate) fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.push_triangle(a, b, c);
        self.push_triangle(a, c, d);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Smooth, area-weighted vertex normals from the current positions.
    ///
    /// Vertices shared between faces are averaged; vertices that are not
    /// shared (seams between the top and the walls) keep hard edges.
    /// Degenerate triangles contribute nothing.
    pub fn recompute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            // Cross product length is twice the area, which gives the weighting.
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            acc[a] += face;
            acc[b] += face;
            acc[c] += face;
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Z))
            .collect();
    }

    /// Rotate every position and normal in place.
    pub(crate) fn rotate_z(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        let rot = |v: Vec3| Vec3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z);
        for p in &mut self.positions {
            *p = rot(*p);
        }
        for n in &mut self.normals {
            *n = rot(*n);
        }
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    /// Build a renderable triangle-list mesh with tangents for normal mapping.
    pub fn to_mesh(&self) -> Mesh {
        let positions: Vec<[f32; 3]> = self.positions.iter().map(|p| p.to_array()).collect();
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|n| n.to_array()).collect();
        let uvs: Vec<[f32; 2]> = self.uvs.iter().map(|uv| uv.to_array()).collect();

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
            .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
            .with_inserted_indices(Indices::U32(self.indices.clone()));
        if let Err(e) = mesh.generate_tangents() {
            warn!("Slice mesh has no tangents, normal map disabled: {e}");
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> MeshData {
        let mut m = MeshData::default();
        let a = m.push_vertex(Vec3::new(0.0, 0.0, 0.0), Vec2::ZERO);
        let b = m.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec2::X);
        let c = m.push_vertex(Vec3::new(1.0, 1.0, 0.0), Vec2::ONE);
        let d = m.push_vertex(Vec3::new(0.0, 1.0, 0.0), Vec2::Y);
        m.push_quad(a, b, c, d);
        m
    }

    #[test]
    fn flat_ccw_quad_faces_up() {
        let mut m = unit_quad();
        m.recompute_normals();
        assert_eq!(m.triangle_count(), 2);
        for n in &m.normals {
            assert!((*n - Vec3::Z).length() < 1e-6, "normal {n:?} not +Z");
        }
    }

    #[test]
    fn rotation_keeps_normals_unit_length() {
        let mut m = unit_quad();
        m.positions[2].z = 0.5;
        m.recompute_normals();
        m.rotate_z(1.2);
        for n in &m.normals {
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
        assert!((m.positions[1] - Vec3::new(1.2f32.cos(), 1.2f32.sin(), 0.0)).length() < 1e-6);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let m = unit_quad();
        assert_eq!(m.bounds(), Some((Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0))));
        assert_eq!(MeshData::default().bounds(), None);
    }

    #[test]
    fn bevy_mesh_carries_every_attribute() {
        let mut m = unit_quad();
        m.recompute_normals();
        let mesh = m.to_mesh();
        assert_eq!(mesh.count_vertices(), 4);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_TANGENT).is_some());
    }
}
