//! Separating Axis Theorem overlap test
//!
//! Two convex shapes are disjoint iff their projections onto some axis do not
//! overlap. In 3D the candidate axes are the face normals of both shapes and
//! the cross products of every edge pair. When no axis separates the shapes,
//! the axis with the smallest push-out distance gives the minimum translation
//! vector (MTV).

use crate::foundation::math::Vec3;
use super::primitives::ProjectionRange;
use super::shape::Shape;

/// Cross products shorter than this fraction of |e1||e2| are treated as parallel edges
const PARALLEL_EDGE_EPSILON: f32 = 1e-5;

/// Minimum translation vector separating two overlapping shapes
///
/// Translating the first (moving) shape by [`Mtv::vector`] resolves the overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mtv {
    /// Unit push-out direction for the first shape
    pub direction: Vec3,
    /// Distance to move along `direction`; zero when the shapes only touch
    pub depth: f32,
}

impl Mtv {
    /// Push-out vector (`direction * depth`)
    pub fn vector(&self) -> Vec3 {
        self.direction * self.depth
    }

    /// Push-out vector scaled by a correction factor, so resolved shapes end up clear of contact
    pub fn corrected(&self, factor: f32) -> Vec3 {
        self.vector() * factor
    }
}

/// Reusable axis buffer for repeated tests
#[derive(Debug, Default)]
pub struct SatScratch {
    axes: Vec<Vec3>,
}

impl SatScratch {
    /// Create an empty scratch buffer
    pub fn new() -> Self {
        Self::default()
    }
}

/// Test two shapes for overlap, allocating a temporary axis buffer
pub fn collision_test(moving: &Shape, stationary: &Shape) -> Option<Mtv> {
    collision_test_with(&mut SatScratch::new(), moving, stationary)
}

/// Test two shapes for overlap, reusing `scratch` for the candidate axes
///
/// Returns `None` when some axis separates the shapes. Both shapes must have
/// had their transform updated for the current tick.
pub fn collision_test_with(scratch: &mut SatScratch, moving: &Shape, stationary: &Shape) -> Option<Mtv> {
    let axes = &mut scratch.axes;
    axes.clear();
    moving.append_face_axes(axes);
    stationary.append_face_axes(axes);
    append_edge_cross_axes(moving, stationary, axes);

    let mut best: Option<Mtv> = None;
    for axis in axes.iter() {
        let moving_range = moving.project_to_axis(axis);
        let stationary_range = stationary.project_to_axis(axis);
        if moving_range.is_disjoint(&stationary_range) {
            return None;
        }

        let candidate = minimum_translation(axis, &moving_range, &stationary_range);
        if best.map_or(true, |b| candidate.depth < b.depth) {
            best = Some(candidate);
        }
    }

    best
}

/// Overlap test without the MTV
pub fn overlaps(moving: &Shape, stationary: &Shape) -> bool {
    collision_test(moving, stationary).is_some()
}

fn append_edge_cross_axes(moving: &Shape, stationary: &Shape, out: &mut Vec<Vec3>) {
    for moving_edge in moving.edge_directions() {
        for stationary_edge in stationary.edge_directions() {
            let cross = moving_edge.cross(&stationary_edge);
            let length = cross.magnitude();
            let scale = moving_edge.magnitude() * stationary_edge.magnitude();
            if !length.is_finite() || length <= PARALLEL_EDGE_EPSILON * scale {
                continue;
            }
            out.push(cross / length);
        }
    }
}

/// Push-out along one axis for intervals already known to overlap
fn minimum_translation(axis: &Vec3, m: &ProjectionRange, s: &ProjectionRange) -> Mtv {
    let moving_on_left = m.max >= s.min && m.max <= s.max;
    let moving_on_right = m.min <= s.max && m.min >= s.min;
    let moving_inside = moving_on_left && moving_on_right;
    let stationary_inside = !moving_on_left && !moving_on_right;

    let signed = if moving_inside || stationary_inside {
        let (outer, inner) = if moving_inside { (s, m) } else { (m, s) };
        let right_gap = outer.max - inner.max;
        let left_gap = inner.min - outer.min;
        // Slide the inner interval out through the nearer end, clearing its full length
        let shift = if right_gap < left_gap {
            right_gap + inner.length()
        } else if left_gap < right_gap {
            -(left_gap + inner.length())
        } else {
            outer.length()
        };
        // The shift moves the inner interval; when the mover surrounds, move it the other way
        if moving_inside { shift } else { -shift }
    } else if moving_on_left {
        s.min - m.max
    } else {
        s.max - m.min
    };

    if signed < 0.0 {
        Mtv { direction: -axis, depth: -signed }
    } else {
        Mtv { direction: *axis, depth: signed }
    }
}
