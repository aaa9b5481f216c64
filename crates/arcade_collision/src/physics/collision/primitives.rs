//! Primitive geometry shared by the narrow phase and ray queries
//!
//! Rays, counter-clockwise triangles and 1D projection intervals.

use crate::foundation::math::{constants, Vec3};

/// A ray with a usable length
///
/// `t` is the distance along `dir` the ray is considered valid for; pick rays
/// set it to the length of the unnormalized camera-space direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin in world space
    pub start: Vec3,
    /// Normalized direction
    pub dir: Vec3,
    /// Usable length along `dir`
    pub t: f32,
}

impl Ray {
    /// Creates a ray; `dir` is normalized here
    pub fn new(start: Vec3, dir: Vec3, t: f32) -> Self {
        Self {
            start,
            dir: dir.normalize(),
            t,
        }
    }

    /// Get a point along the ray at distance `t`
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.start + self.dir * t
    }

    /// Möller-Trumbore ray-triangle intersection
    ///
    /// Returns the distance along the ray to the hit, `None` when the ray
    /// misses, runs parallel to the triangle or the hit lies behind the start.
    pub fn triangle_test(&self, triangle: &Triangle) -> Option<f32> {
        let edge1 = triangle.b - triangle.a;
        let edge2 = triangle.c - triangle.a;

        let h = self.dir.cross(&edge2);
        let det = edge1.dot(&h);
        if det.abs() < constants::EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = self.start - triangle.a;
        let u = inv_det * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = inv_det * self.dir.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * edge2.dot(&q);
        (t >= 0.0).then_some(t)
    }
}

/// A triangle wound counter-clockwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub a: Vec3,
    /// Second vertex
    pub b: Vec3,
    /// Third vertex
    pub c: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Face normal, `None` for a degenerate (zero-area) triangle
    pub fn normal(&self) -> Option<Vec3> {
        crate::foundation::math::utils::try_normalize(&(self.c - self.b).cross(&(self.a - self.b)))
    }
}

/// Interval covered by a point set projected onto an axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionRange {
    /// Smallest projection
    pub min: f32,
    /// Largest projection
    pub max: f32,
}

impl Default for ProjectionRange {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl ProjectionRange {
    /// Project points onto a normalized axis
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a Vec3>, axis: &Vec3) -> Self {
        points.into_iter().fold(Self::default(), |range, point| {
            let projection = point.dot(axis);
            Self {
                min: range.min.min(projection),
                max: range.max.max(projection),
            }
        })
    }

    /// True if the two intervals have a gap between them (touching is not a gap)
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.max < other.min || other.max < self.min
    }

    /// Length of the interval
    pub fn length(&self) -> f32 {
        self.max - self.min
    }
}
