//! Radially sliced, deformed pie geometry.
//!
//! Each slice is a wedge in a Z-up build frame: the outline runs from the
//! origin out to an arc of angular width `span` at `radius`, and is extruded
//! from `z = 0` to `z = height`. The top face is a polar grid so it can bend:
//!
//!  - a symmetric cubic falloff dips the top toward both straight edges,
//!  - a `sin·cos` wobble in world XY roughens the surface, continuous across
//!    neighbouring wedges,
//!  - the result is clamped so nothing rises above the flat top.
//!
//! Top and bottom UVs are a planar projection of world XY onto the unit
//! square, the rim touching its edges, so one texture covers the whole disk
//! without a seam between slices. Walls unwrap cylindrically (arc length → U,
//! height → V).

use std::f32::consts::TAU;

use bevy::{
    log::debug,
    math::{Vec2, Vec3},
};

use crate::geometry::MeshData;

/// Rejected [`SliceConfig`] values.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceConfigError {
    /// Fewer than two slices.
    TooFewSlices { count: usize },
    /// `radius` was zero, negative or not finite.
    NonPositiveRadius { radius: f32 },
    /// `height` was zero, negative or not finite.
    NonPositiveHeight { height: f32 },
    /// `gap_radians` was negative or not finite.
    InvalidGap { gap: f32 },
    /// `edge_dip`, `wobble_amplitude` or `wobble_frequency` was negative or not finite.
    InvalidDeformation { edge_dip: f32, wobble_amplitude: f32 },
    /// The gaps consume the whole circle: `slice_count · gap ≥ 2π`.
    DegenerateSpan { span: f32 },
}

impl std::fmt::Display for SliceConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SliceConfigError::TooFewSlices { count } => {
                write!(f, "a pie needs at least 2 slices (got {count})")
            }
            SliceConfigError::NonPositiveRadius { radius } => {
                write!(f, "radius must be positive (got {radius})")
            }
            SliceConfigError::NonPositiveHeight { height } => {
                write!(f, "height must be positive (got {height})")
            }
            SliceConfigError::InvalidGap { gap } => {
                write!(f, "gap must be a non-negative angle (got {gap})")
            }
            SliceConfigError::InvalidDeformation {
                edge_dip,
                wobble_amplitude,
            } => write!(
                f,
                "edge dip and wobble must be non-negative (got {edge_dip}, {wobble_amplitude})"
            ),
            SliceConfigError::DegenerateSpan { span } => write!(
                f,
                "gaps leave no room for the slices: per-slice span would be {span} rad"
            ),
        }
    }
}

impl std::error::Error for SliceConfigError {}

/// Shape parameters for [`build_slice_assembly`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SliceConfig {
    pub slice_count: usize,
    pub radius: f32,
    pub height: f32,
    /// Empty angle between neighbouring slices.
    pub gap_radians: f32,
    /// Maximum downward dip at the straight edges.
    pub edge_dip: f32,
    pub wobble_amplitude: f32,
    /// Spatial frequency `k1` of the wobble, in radians per world unit.
    pub wobble_frequency: f32,
    /// Wraps modulo `slice_count`.
    pub marked_slice_index: usize,
    /// One label per slice; missing entries become empty strings.
    pub fortune_labels: Vec<String>,
    /// Rings in the top-face grid.
    pub radial_segments: u32,
    /// Arc subdivisions per slice.
    pub arc_segments: u32,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            slice_count: 8,
            radius: 1.0,
            height: 0.25,
            gap_radians: 0.02,
            edge_dip: 0.04,
            wobble_amplitude: 0.006,
            wobble_frequency: 9.0,
            marked_slice_index: 0,
            fortune_labels: [
                "Luck", "Love", "Wealth", "Health", "Travel", "Wisdom", "Joy", "Courage",
            ]
            .map(String::from)
            .to_vec(),
            radial_segments: 12,
            arc_segments: 16,
        }
    }
}

impl SliceConfig {
    /// Angular width of one slice: `(2π − n·gap) / n`.
    pub fn span(&self) -> f32 {
        let n = self.slice_count as f32;
        (TAU - n * self.gap_radians) / n
    }

    /// Check every field; returns the per-slice span on success.
    pub fn validate(&self) -> Result<f32, SliceConfigError> {
        if self.slice_count < 2 {
            return Err(SliceConfigError::TooFewSlices {
                count: self.slice_count,
            });
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SliceConfigError::NonPositiveRadius {
                radius: self.radius,
            });
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(SliceConfigError::NonPositiveHeight {
                height: self.height,
            });
        }
        if !(self.gap_radians.is_finite() && self.gap_radians >= 0.0) {
            return Err(SliceConfigError::InvalidGap {
                gap: self.gap_radians,
            });
        }
        let deformation_ok = [self.edge_dip, self.wobble_amplitude, self.wobble_frequency]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !deformation_ok {
            return Err(SliceConfigError::InvalidDeformation {
                edge_dip: self.edge_dip,
                wobble_amplitude: self.wobble_amplitude,
            });
        }
        let span = self.span();
        if span <= 0.0 {
            return Err(SliceConfigError::DegenerateSpan { span });
        }
        Ok(span)
    }
}

/// Where one wedge sits and how its top bends.
#[derive(Clone, Copy, Debug)]
pub struct WedgeFrame {
    /// Angular width of the wedge.
    pub span: f32,
    /// World angle of the wedge's `θ = 0` edge.
    pub slot_angle: f32,
    pub radius: f32,
    pub height: f32,
    pub edge_dip: f32,
    pub wobble_amplitude: f32,
    pub wobble_frequency: f32,
}

impl WedgeFrame {
    fn new(config: &SliceConfig, span: f32, index: usize) -> Self {
        Self {
            span,
            slot_angle: index as f32 * (span + config.gap_radians),
            radius: config.radius,
            height: config.height,
            edge_dip: config.edge_dip,
            wobble_amplitude: config.wobble_amplitude,
            wobble_frequency: config.wobble_frequency,
        }
    }

    /// World angle halfway across the wedge.
    pub fn angular_midpoint(&self) -> f32 {
        self.slot_angle + self.span * 0.5
    }

    fn to_world(&self, local: Vec2) -> Vec2 {
        Vec2::from_angle(self.slot_angle).rotate(local)
    }
}

/// Which part of the wedge a vertex belongs to, for UV projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceKind {
    Top,
    Bottom,
    /// The curved outer wall.
    OuterWall,
    /// Either of the two radial cut faces.
    CutWall,
}

/// `|2t − 1|³`: zero at the wedge centre line, one at both straight edges.
#[inline]
pub fn edge_falloff(t: f32) -> f32 {
    (2.0 * t.clamp(0.0, 1.0) - 1.0).abs().powi(3)
}

/// Bend a top-face vertex given in the wedge's local frame.
///
/// Only `z` changes. The result never exceeds `frame.height`.
pub fn deform(vertex: Vec3, frame: &WedgeFrame) -> Vec3 {
    let local = vertex.truncate();
    let r = local.length();
    // The apex belongs to every wedge equally; treat it as the centre line.
    let t = if r > 1e-6 {
        local.y.atan2(local.x) / frame.span
    } else {
        0.5
    };
    let dip = frame.edge_dip * edge_falloff(t);

    let world = frame.to_world(local);
    let k = frame.wobble_frequency;
    let wobble = (world.x * k).sin() * (world.y * k).cos() * frame.wobble_amplitude;

    let z = (frame.height - dip + wobble).min(frame.height);
    Vec3::new(vertex.x, vertex.y, z)
}

/// UV for a vertex given in the wedge's local frame.
pub fn project_uv(vertex: Vec3, face: FaceKind, frame: &WedgeFrame) -> Vec2 {
    let local = vertex.truncate();
    match face {
        FaceKind::Top | FaceKind::Bottom => {
            // Planar disk projection in world space: the texture centre sits
            // on the pie centre and the texture edge on the rim.
            let world = frame.to_world(local) / frame.radius;
            Vec2::new(0.5 + 0.5 * world.x, 0.5 - 0.5 * world.y)
        }
        FaceKind::OuterWall => {
            let angle = frame.slot_angle + local.y.atan2(local.x);
            Vec2::new(angle / TAU, vertex.z / frame.height)
        }
        // Same texel density along the cut as along the rim.
        FaceKind::CutWall => Vec2::new(
            local.length() / (TAU * frame.radius),
            vertex.z / frame.height,
        ),
    }
}

/// Top and side (walls + bottom) geometry of one wedge, in world orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct WedgeMesh {
    pub top: MeshData,
    pub side: MeshData,
}

/// One slice of a built assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct Slice {
    pub index: usize,
    pub angular_midpoint: f32,
    pub angular_span: f32,
    pub fortune_label: String,
    pub has_marker: bool,
    pub wedge: WedgeMesh,
}

/// Output of [`build_slice_assembly`]. `M` is whatever handle the caller
/// uses for materials; the builder never looks inside it.
#[derive(Clone, Debug)]
pub struct SliceAssembly<M> {
    pub slices: Vec<Slice>,
    pub top_material: M,
    pub side_material: M,
}

/// Build `config.slice_count` deformed wedges.
pub fn build_slice_assembly<M>(
    config: &SliceConfig,
    top_material: M,
    side_material: M,
) -> Result<SliceAssembly<M>, SliceConfigError> {
    let span = config.validate()?;
    let n = config.slice_count;

    let marked = config.marked_slice_index % n;
    if marked != config.marked_slice_index {
        debug!(
            "marked slice {} out of range, wrapped to {marked}",
            config.marked_slice_index
        );
    }
    if config.fortune_labels.len() < n {
        debug!(
            "{} fortune labels for {n} slices, padding with empty labels",
            config.fortune_labels.len()
        );
    }

    let slices = (0..n)
        .map(|index| {
            let frame = WedgeFrame::new(config, span, index);
            Slice {
                index,
                angular_midpoint: frame.angular_midpoint(),
                angular_span: span,
                fortune_label: config
                    .fortune_labels
                    .get(index)
                    .cloned()
                    .unwrap_or_default(),
                has_marker: index == marked,
                wedge: build_wedge(config, &frame),
            }
        })
        .collect();

    debug!("built {n} slices, span {span:.4} rad");
    Ok(SliceAssembly {
        slices,
        top_material,
        side_material,
    })
}

fn build_wedge(config: &SliceConfig, frame: &WedgeFrame) -> WedgeMesh {
    let rings = config.radial_segments.max(1) as usize;
    let arcs = config.arc_segments.max(1) as usize;
    let polar = |ring: usize, arc: usize| {
        let r = frame.radius * ring as f32 / rings as f32;
        let theta = frame.span * arc as f32 / arcs as f32;
        Vec2::from_angle(theta) * r
    };
    let top_at = |p: Vec2| deform(p.extend(frame.height), frame);

    // --- top ---
    let mut top = MeshData::default();
    let apex = top_at(Vec2::ZERO);
    let centre = top.push_vertex(apex, project_uv(apex, FaceKind::Top, frame));
    let mut grid = Vec::with_capacity(rings * (arcs + 1));
    for ring in 1..=rings {
        for arc in 0..=arcs {
            let p = top_at(polar(ring, arc));
            grid.push(top.push_vertex(p, project_uv(p, FaceKind::Top, frame)));
        }
    }
    let at = |ring: usize, arc: usize| grid[(ring - 1) * (arcs + 1) + arc];
    for arc in 0..arcs {
        top.push_triangle(centre, at(1, arc), at(1, arc + 1));
    }
    for ring in 1..rings {
        for arc in 0..arcs {
            top.push_quad(
                at(ring, arc),
                at(ring + 1, arc),
                at(ring + 1, arc + 1),
                at(ring, arc + 1),
            );
        }
    }

    // --- walls and bottom ---
    let mut side = MeshData::default();
    let mut wall = |points: &[Vec2], face: FaceKind, flip: bool| {
        let mut columns = Vec::with_capacity(points.len());
        for &p in points {
            let floor = p.extend(0.0);
            let lip = top_at(p);
            columns.push((
                side.push_vertex(floor, project_uv(floor, face, frame)),
                side.push_vertex(lip, project_uv(lip, face, frame)),
            ));
        }
        for pair in columns.windows(2) {
            let ((b0, t0), (b1, t1)) = (pair[0], pair[1]);
            if flip {
                side.push_quad(b1, b0, t0, t1);
            } else {
                side.push_quad(b0, b1, t1, t0);
            }
        }
    };
    let start_cut: Vec<Vec2> = (0..=rings).map(|ring| polar(ring, 0)).collect();
    let end_cut: Vec<Vec2> = (0..=rings).map(|ring| polar(ring, arcs)).collect();
    let rim: Vec<Vec2> = (0..=arcs).map(|arc| polar(rings, arc)).collect();
    wall(&start_cut, FaceKind::CutWall, false);
    wall(&end_cut, FaceKind::CutWall, true);
    wall(&rim, FaceKind::OuterWall, false);

    let floor_centre = side.push_vertex(
        Vec3::ZERO,
        project_uv(Vec3::ZERO, FaceKind::Bottom, frame),
    );
    let floor_rim: Vec<u32> = rim
        .iter()
        .map(|p| {
            let v = p.extend(0.0);
            side.push_vertex(v, project_uv(v, FaceKind::Bottom, frame))
        })
        .collect();
    for pair in floor_rim.windows(2) {
        side.push_triangle(floor_centre, pair[1], pair[0]);
    }

    top.recompute_normals();
    side.recompute_normals();
    top.rotate_z(frame.slot_angle);
    side.rotate_z(frame.slot_angle);
    WedgeMesh { top, side }
}
