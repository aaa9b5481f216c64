//! Convex collision shapes for the SAT narrow phase
//!
//! A shape is a local-space point cloud plus the edges and faces whose
//! directions can separate it from another shape. Geometry is shared between
//! instances; each instance only owns its world transform and transformed
//! points, refreshed by [`Shape::update_transform`].

use std::sync::{Arc, OnceLock};

use crate::foundation::math::{utils, Mat4, Vec3};
use crate::spatial::{Aabb, UNIT_CUBE_CORNERS};
use super::primitives::ProjectionRange;

/// Pair of point indices forming an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Head of the edge
    pub a: usize,
    /// Tail of the edge
    pub b: usize,
}

impl Edge {
    /// Creates an edge from `b` to `a`
    pub const fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }
}

/// Two edges spanning a face; their cross product is the face normal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// First spanning edge
    pub first: Edge,
    /// Second spanning edge
    pub second: Edge,
}

impl Face {
    /// Creates a face from two spanning edges
    pub const fn new(first: Edge, second: Edge) -> Self {
        Self { first, second }
    }
}

/// Which construction a shape came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Unit cube centered at the origin
    Cube,
    /// Hexagonal capsule with pointed caps
    PolygonCapsule,
    /// Convex hull approximated by a processed triangle list
    TriangleMesh,
}

/// Immutable local-space geometry, shared by every instance of a shape
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeGeometry {
    /// Construction the geometry came from
    pub kind: ShapeKind,
    /// Local-space points
    pub points: Vec<Vec3>,
    /// Unique edge directions (parallel edges listed once)
    pub edges: Vec<Edge>,
    /// Unique face orientations (parallel faces listed once)
    pub faces: Vec<Face>,
}

impl ShapeGeometry {
    /// Cube geometry; three edges and three faces cover every direction
    pub fn cube() -> Arc<Self> {
        static CUBE: OnceLock<Arc<ShapeGeometry>> = OnceLock::new();
        CUBE.get_or_init(|| {
            // Front face then back face, each starting at the right-bottom corner
            let points = vec![
                Vec3::new(0.5, -0.5, 0.5),
                Vec3::new(0.5, 0.5, 0.5),
                Vec3::new(-0.5, 0.5, 0.5),
                Vec3::new(-0.5, -0.5, 0.5),
                Vec3::new(0.5, -0.5, -0.5),
                Vec3::new(0.5, 0.5, -0.5),
                Vec3::new(-0.5, 0.5, -0.5),
                Vec3::new(-0.5, -0.5, -0.5),
            ];
            let edges = vec![Edge::new(1, 0), Edge::new(3, 0), Edge::new(4, 0)];
            let faces = vec![
                Face::new(Edge::new(1, 0), Edge::new(3, 0)),
                Face::new(Edge::new(4, 0), Edge::new(1, 0)),
                Face::new(Edge::new(5, 1), Edge::new(2, 1)),
            ];
            Arc::new(Self {
                kind: ShapeKind::Cube,
                points,
                edges,
                faces,
            })
        })
        .clone()
    }

    /// Capsule geometry: a square ring at y = ±0.5 with tips at y = ±1.5
    pub fn polygon_capsule() -> Arc<Self> {
        static CAPSULE: OnceLock<Arc<ShapeGeometry>> = OnceLock::new();
        CAPSULE.get_or_init(|| {
            let points = vec![
                Vec3::new(0.0, -1.5, 0.0),
                Vec3::new(1.0, -0.5, 0.0),
                Vec3::new(0.0, -0.5, 1.0),
                Vec3::new(-1.0, -0.5, 0.0),
                Vec3::new(0.0, -0.5, -1.0),
                Vec3::new(1.0, 0.5, 0.0),
                Vec3::new(0.0, 0.5, 1.0),
                Vec3::new(-1.0, 0.5, 0.0),
                Vec3::new(0.0, 0.5, -1.0),
                Vec3::new(0.0, 1.5, 0.0),
            ];
            // Mirrored edges and faces produce the same axes and are omitted
            let edges = vec![
                Edge::new(0, 1),
                Edge::new(0, 2),
                Edge::new(0, 3),
                Edge::new(0, 4),
                Edge::new(2, 1),
                Edge::new(4, 1),
                Edge::new(1, 5),
            ];
            let faces = vec![
                Face::new(Edge::new(1, 0), Edge::new(2, 0)),
                Face::new(Edge::new(2, 0), Edge::new(3, 0)),
                Face::new(Edge::new(3, 0), Edge::new(4, 0)),
                Face::new(Edge::new(4, 0), Edge::new(1, 0)),
                Face::new(Edge::new(5, 1), Edge::new(2, 1)),
                Face::new(Edge::new(4, 1), Edge::new(5, 1)),
            ];
            Arc::new(Self {
                kind: ShapeKind::PolygonCapsule,
                points,
                edges,
                faces,
            })
        })
        .clone()
    }
}

/// A convex shape instance with its current world transform
#[derive(Debug, Clone)]
pub struct Shape {
    geometry: Arc<ShapeGeometry>,
    transform: Mat4,
    world_points: Vec<Vec3>,
    local_origin: Vec3,
    world_origin: Vec3,
}

impl Shape {
    /// Instance of shared geometry at the identity transform
    pub fn from_geometry(geometry: Arc<ShapeGeometry>) -> Self {
        let world_points = geometry.points.clone();
        Self {
            geometry,
            transform: Mat4::identity(),
            world_points,
            local_origin: Vec3::zeros(),
            world_origin: Vec3::zeros(),
        }
    }

    /// Unit cube
    pub fn cube() -> Self {
        Self::from_geometry(ShapeGeometry::cube())
    }

    /// Polygon capsule
    pub fn polygon_capsule() -> Self {
        Self::from_geometry(ShapeGeometry::polygon_capsule())
    }

    /// Construction this shape came from
    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind
    }

    /// Shared local geometry
    pub fn geometry(&self) -> &Arc<ShapeGeometry> {
        &self.geometry
    }

    /// Current world transform
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Points after the last [`Shape::update_transform`]
    pub fn world_points(&self) -> &[Vec3] {
        &self.world_points
    }

    /// World position of the shape's origin
    pub fn origin(&self) -> Vec3 {
        self.world_origin
    }

    /// Move the point treated as the shape's origin, in local space
    pub fn override_local_origin(&mut self, local_origin: Vec3) {
        self.local_origin = local_origin;
        self.world_origin = utils::transform_point(&self.transform, &self.local_origin);
    }

    /// Recompute world points and origin for a new world model matrix
    pub fn update_transform(&mut self, world: &Mat4) {
        self.transform = *world;
        for (world_point, local_point) in self.world_points.iter_mut().zip(&self.geometry.points) {
            *world_point = utils::transform_point(world, local_point);
        }
        self.world_origin = utils::transform_point(world, &self.local_origin);
    }

    /// Interval covered by the world points along a normalized axis
    pub fn project_to_axis(&self, axis: &Vec3) -> ProjectionRange {
        ProjectionRange::of_points(&self.world_points, axis)
    }

    /// World-space direction of each unique edge
    pub fn edge_directions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.geometry
            .edges
            .iter()
            .map(|edge| self.world_points[edge.a] - self.world_points[edge.b])
    }

    /// Push the normalized world face normals onto `out`, skipping degenerate faces
    pub fn append_face_axes(&self, out: &mut Vec<Vec3>) {
        for face in &self.geometry.faces {
            let e1 = self.world_points[face.first.a] - self.world_points[face.first.b];
            let e2 = self.world_points[face.second.a] - self.world_points[face.second.b];
            if let Some(axis) = utils::try_normalize(&e1.cross(&e2)) {
                out.push(axis);
            }
        }
    }

    /// Axis-aligned box around the world points
    pub fn world_bounds(&self) -> Aabb {
        Aabb::from_points(&self.world_points)
            .unwrap_or_else(|| Aabb::new(self.world_origin, self.world_origin))
    }
}

/// Corners of the unit cube in [`UNIT_CUBE_CORNERS`] order, transformed by `matrix`
pub fn transformed_unit_cube(matrix: &Mat4) -> [Vec3; 8] {
    UNIT_CUBE_CORNERS.map(|corner| utils::transform_point(matrix, &corner))
}
