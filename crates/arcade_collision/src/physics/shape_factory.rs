//! Builds collision shapes by type
//!
//! Cube and capsule geometry is fixed. The mesh-backed types (wedge, pyramid,
//! spheres) start from small procedural meshes fitted to the unit cube, and
//! can be replaced by authored OBJ meshes through [`ShapeFactory::register_mesh`].
//! Processing a mesh is the expensive part, so it happens once per type and
//! every generated shape shares the processed geometry.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, error};

use crate::assets::{MeshData, ObjLoader};
use crate::config::SatConfig;
use crate::foundation::math::{constants, Vec3};
use super::collision::{Shape, TriangleProcessor};
use super::collision_data::CollisionShapeType;
use super::CollisionError;

/// Generates [`Shape`]s for each [`CollisionShapeType`]
#[derive(Debug, Clone)]
pub struct ShapeFactory {
    meshes: HashMap<CollisionShapeType, TriangleProcessor>,
    tolerance: f32,
}

impl Default for ShapeFactory {
    fn default() -> Self {
        Self::new(SatConfig::default().normal_dedup_tolerance)
    }
}

impl ShapeFactory {
    /// Factory with the procedural meshes, deduplicating axes within `tolerance`
    pub fn new(tolerance: f32) -> Self {
        let mut factory = Self {
            meshes: HashMap::new(),
            tolerance,
        };
        for (shape_type, mesh) in [
            (CollisionShapeType::Wedge, wedge_mesh()),
            (CollisionShapeType::Pyramid, pyramid_mesh()),
            (CollisionShapeType::IcoSphere, icosphere_mesh()),
            (CollisionShapeType::UvSphere, uv_sphere_mesh(8, 6)),
        ] {
            if let Err(e) = factory.register_mesh(shape_type, &mesh) {
                error!("Failed to build {shape_type} collision mesh: {e}");
            }
        }
        factory
    }

    /// Factory using the configured dedup tolerance
    pub fn from_config(config: &SatConfig) -> Self {
        Self::new(config.normal_dedup_tolerance)
    }

    /// Dedup tolerance used for mesh-backed shapes
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Replace the mesh behind a mesh-backed shape type
    pub fn register_mesh(&mut self, shape_type: CollisionShapeType, mesh: &MeshData) -> Result<(), CollisionError> {
        let processor = TriangleProcessor::from_indexed(&mesh.positions, &mesh.indices, self.tolerance)?;
        debug!(
            "Registered {shape_type} collision mesh ({} triangles)",
            processor.triangle_count()
        );
        self.meshes.insert(shape_type, processor);
        Ok(())
    }

    /// Load an OBJ file as the mesh behind a shape type
    pub fn register_obj<P: AsRef<Path>>(&mut self, shape_type: CollisionShapeType, path: P) -> Result<(), CollisionError> {
        let mesh = ObjLoader::load_obj(path)?;
        self.register_mesh(shape_type, &mesh)
    }

    /// New shape instance of a type
    ///
    /// [`CollisionShapeType::Model`] needs the model's triangles; use
    /// [`ShapeFactory::generate_model_shape`] for it.
    pub fn generate_shape(&self, shape_type: CollisionShapeType) -> Result<Shape, CollisionError> {
        match shape_type {
            CollisionShapeType::Cube => Ok(Shape::cube()),
            CollisionShapeType::PolyCapsule => Ok(Shape::polygon_capsule()),
            CollisionShapeType::Model => Err(CollisionError::MissingModel),
            mesh_type => self
                .meshes
                .get(&mesh_type)
                .map(TriangleProcessor::instance)
                .ok_or(CollisionError::MissingShapeGeometry(mesh_type)),
        }
    }

    /// Shape built from a model's own triangles
    pub fn generate_model_shape(&self, model: &MeshData) -> Result<Shape, CollisionError> {
        Ok(TriangleProcessor::from_indexed(&model.positions, &model.indices, self.tolerance)?.instance())
    }
}

fn pyramid_mesh() -> MeshData {
    let positions = vec![
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, 0.5),
        Vec3::new(-0.5, -0.5, 0.5),
        Vec3::new(0.0, 0.5, 0.0),
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, // base
        0, 4, 1, 1, 4, 2, 2, 4, 3, 3, 4, 0,
    ];
    MeshData::new(positions, indices)
}

/// Cockpit-style wedge: full height at the back (+z), sloping to the front edge
fn wedge_mesh() -> MeshData {
    let positions = vec![
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, 0.5),
        Vec3::new(-0.5, -0.5, 0.5),
        Vec3::new(-0.5, 0.5, 0.5),
        Vec3::new(0.5, 0.5, 0.5),
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, // bottom
        3, 2, 5, 3, 5, 4, // back
        0, 4, 5, 0, 5, 1, // slope
        0, 3, 4, // left
        1, 5, 2, // right
    ];
    MeshData::new(positions, indices)
}

fn icosphere_mesh() -> MeshData {
    let phi = (1.0 + 5.0f32.sqrt()) * 0.5;
    let raw = [
        (-1.0, phi, 0.0), (1.0, phi, 0.0), (-1.0, -phi, 0.0), (1.0, -phi, 0.0),
        (0.0, -1.0, phi), (0.0, 1.0, phi), (0.0, -1.0, -phi), (0.0, 1.0, -phi),
        (phi, 0.0, -1.0), (phi, 0.0, 1.0), (-phi, 0.0, -1.0), (-phi, 0.0, 1.0),
    ];
    let positions = raw
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize() * 0.5)
        .collect();
    let indices = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11,
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8,
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9,
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];
    MeshData::new(positions, indices)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn uv_sphere_mesh(segments: u32, rings: u32) -> MeshData {
    let mut positions = vec![Vec3::new(0.0, 0.5, 0.0)];
    for ring in 1..rings {
        let polar = constants::PI * ring as f32 / rings as f32;
        for segment in 0..segments {
            let azimuth = 2.0 * constants::PI * segment as f32 / segments as f32;
            positions.push(Vec3::new(
                0.5 * polar.sin() * azimuth.cos(),
                0.5 * polar.cos(),
                0.5 * polar.sin() * azimuth.sin(),
            ));
        }
    }
    let bottom = positions.len() as u32;
    positions.push(Vec3::new(0.0, -0.5, 0.0));

    let ring_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut indices = Vec::new();
    for segment in 0..segments {
        let next = (segment + 1) % segments;
        indices.extend_from_slice(&[0, ring_start(1) + next, ring_start(1) + segment]);
    }
    for ring in 1..rings - 1 {
        for segment in 0..segments {
            let next = (segment + 1) % segments;
            let a = ring_start(ring) + segment;
            let b = ring_start(ring) + next;
            let c = ring_start(ring + 1) + segment;
            let d = ring_start(ring + 1) + next;
            indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }
    let last = ring_start(rings - 1);
    for segment in 0..segments {
        let next = (segment + 1) % segments;
        indices.extend_from_slice(&[bottom, last + segment, last + next]);
    }
    MeshData::new(positions, indices)
}
