//! Triangle-mesh collision geometry
//!
//! [`TriangleProcessor`] turns a triangle list into SAT geometry: every
//! triangle normal and edge direction becomes a candidate axis, but
//! directions within the dedup tolerance of one already kept are dropped so
//! symmetric meshes do not multiply the axis count.

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::math::{utils, Vec3};
use crate::physics::CollisionError;
use super::primitives::Triangle;
use super::shape::{Edge, Face, Shape, ShapeGeometry, ShapeKind};

/// Preprocessed triangle mesh, ready to instance as many shapes as needed
#[derive(Debug, Clone)]
pub struct TriangleProcessor {
    geometry: Arc<ShapeGeometry>,
    triangle_count: usize,
}

impl TriangleProcessor {
    /// Process triangles, merging normals/edges whose |dot| >= 1 - `tolerance`
    pub fn new(triangles: &[Triangle], tolerance: f32) -> Result<Self, CollisionError> {
        if triangles.is_empty() {
            return Err(CollisionError::EmptyMesh);
        }

        let same_if_at_least = 1.0 - tolerance;
        let is_unique = |kept: &[Vec3], candidate: &Vec3| {
            kept.iter().all(|prev| prev.dot(candidate).abs() < same_if_at_least)
        };

        let mut points = Vec::with_capacity(triangles.len() * 3);
        let mut point_lookup: HashMap<[u32; 3], usize> = HashMap::new();
        let mut intern = |p: Vec3| {
            *point_lookup
                .entry([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
                .or_insert_with(|| {
                    points.push(p);
                    points.len() - 1
                })
        };

        let mut unique_normals: Vec<Vec3> = Vec::new();
        let mut unique_edges: Vec<Vec3> = Vec::new();
        let mut faces = Vec::new();
        let mut edges = Vec::new();

        for tri in triangles {
            let a = intern(tri.a);
            let b = intern(tri.b);
            let c = intern(tri.c);

            if let Some(normal) = tri.normal() {
                if is_unique(&unique_normals, &normal) {
                    unique_normals.push(normal);
                    faces.push(Face::new(Edge::new(c, b), Edge::new(a, b)));
                }
            }

            for (edge, direction) in [
                (Edge::new(c, b), tri.c - tri.b),
                (Edge::new(a, b), tri.a - tri.b),
                (Edge::new(c, a), tri.c - tri.a),
            ] {
                let Some(direction) = utils::try_normalize(&direction) else {
                    continue;
                };
                if is_unique(&unique_edges, &direction) {
                    unique_edges.push(direction);
                    edges.push(edge);
                }
            }
        }

        if faces.is_empty() {
            return Err(CollisionError::DegenerateMesh);
        }

        log::debug!(
            "Processed {} triangles into {} face axes, {} edges, {} points",
            triangles.len(),
            faces.len(),
            edges.len(),
            points.len()
        );

        Ok(Self {
            geometry: Arc::new(ShapeGeometry {
                kind: ShapeKind::TriangleMesh,
                points,
                edges,
                faces,
            }),
            triangle_count: triangles.len(),
        })
    }

    /// Process an indexed mesh (three indices per triangle)
    pub fn from_indexed(positions: &[Vec3], indices: &[u32], tolerance: f32) -> Result<Self, CollisionError> {
        Self::new(&triangles_from_indexed(positions, indices)?, tolerance)
    }

    /// Number of input triangles
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Shared processed geometry
    pub fn geometry(&self) -> &Arc<ShapeGeometry> {
        &self.geometry
    }

    /// New shape instance backed by this geometry
    pub fn instance(&self) -> Shape {
        Shape::from_geometry(Arc::clone(&self.geometry))
    }
}

/// Expand an indexed mesh into triangles, validating the index buffer
pub fn triangles_from_indexed(positions: &[Vec3], indices: &[u32]) -> Result<Vec<Triangle>, CollisionError> {
    if indices.len() % 3 != 0 {
        return Err(CollisionError::IndexCount(indices.len()));
    }
    let fetch = |index: u32| {
        positions
            .get(index as usize)
            .copied()
            .ok_or(CollisionError::IndexOutOfRange {
                index,
                vertex_count: positions.len(),
            })
    };
    indices
        .chunks_exact(3)
        .map(|tri| Ok(Triangle::new(fetch(tri[0])?, fetch(tri[1])?, fetch(tri[2])?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_mesh() -> (Vec<Vec3>, Vec<u32>) {
        let positions = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 1, 5, 0, 5, 4, // bottom
            3, 6, 2, 3, 7, 6, // top
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
        ];
        (positions, indices)
    }

    #[test]
    fn test_zero_triangles_is_an_error() {
        assert!(matches!(TriangleProcessor::new(&[], 0.001), Err(CollisionError::EmptyMesh)));
    }

    #[test]
    fn test_degenerate_only_mesh_is_an_error() {
        let flat = Triangle::new(Vec3::zeros(), Vec3::x(), Vec3::x() * 2.0);
        assert!(matches!(
            TriangleProcessor::new(&[flat], 0.001),
            Err(CollisionError::DegenerateMesh)
        ));
    }

    #[test]
    fn test_cube_mesh_dedups_to_three_face_axes() {
        let (positions, indices) = cube_mesh();
        let processor = TriangleProcessor::from_indexed(&positions, &indices, 0.001).unwrap();
        let geometry = processor.geometry();

        assert_eq!(processor.triangle_count(), 12);
        assert_eq!(geometry.faces.len(), 3);
        assert_eq!(geometry.points.len(), 8);
        // Three axis edges plus the one diagonal each face pair is split along
        assert_eq!(geometry.edges.len(), 3 + 3);
    }

    #[test]
    fn test_bad_indices_are_rejected() {
        let (positions, _) = cube_mesh();
        assert!(matches!(
            TriangleProcessor::from_indexed(&positions, &[0, 1], 0.001),
            Err(CollisionError::IndexCount(2))
        ));
        assert!(matches!(
            TriangleProcessor::from_indexed(&positions, &[0, 1, 42], 0.001),
            Err(CollisionError::IndexOutOfRange { index: 42, vertex_count: 8 })
        ));
    }
}
