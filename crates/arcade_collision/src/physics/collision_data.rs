//! Per-entity collision configuration
//!
//! [`CollisionData`] holds what an entity needs for both collision phases:
//! a coarse box (the local AABB, placed in the grid as a world OBB) and the
//! ordered list of fine-grained shapes tested with SAT. It is built once when
//! a spawn config loads and then only has its world transform refreshed.

use std::fmt;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::assets::{MeshData, ObjLoader};
use crate::foundation::math::{utils, Mat4, Transform, Vec3};
use crate::spatial::{Aabb, UNIT_CUBE_CORNERS};
use super::collision::{transformed_unit_cube, Shape};
use super::shape_factory::ShapeFactory;
use super::CollisionError;

/// Which kind of shape a [`ShapeData`] entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionShapeType {
    /// Unit cube
    Cube,
    /// Hexagonal capsule
    PolyCapsule,
    /// Cockpit-style wedge
    Wedge,
    /// Square pyramid
    Pyramid,
    /// Icosahedron approximating a sphere
    IcoSphere,
    /// Latitude/longitude sphere
    #[serde(rename = "UVSphere", alias = "UvSphere")]
    UvSphere,
    /// The entity's own model triangles
    #[serde(rename = "model", alias = "Model")]
    Model,
}

impl CollisionShapeType {
    /// Every shape type
    pub const ALL: [Self; 7] = [
        Self::Cube,
        Self::PolyCapsule,
        Self::Wedge,
        Self::Pyramid,
        Self::IcoSphere,
        Self::UvSphere,
        Self::Model,
    ];

    /// Display name, as written in spawn configs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cube => "Cube",
            Self::PolyCapsule => "PolyCapsule",
            Self::Wedge => "Wedge",
            Self::Pyramid => "Pyramid",
            Self::IcoSphere => "IcoSphere",
            Self::UvSphere => "UVSphere",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for CollisionShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fine-grained shape of an entity
#[derive(Debug, Clone)]
pub struct ShapeData {
    /// Shape instance; its transform is world * `local_transform`
    pub shape: Shape,
    /// Placement relative to the entity's model matrix
    pub local_transform: Mat4,
    /// Kind of shape, used to pick cheap cube-only paths
    pub shape_type: CollisionShapeType,
}

impl ShapeData {
    /// Bundle a shape with its local placement
    pub fn new(shape: Shape, local_transform: Mat4, shape_type: CollisionShapeType) -> Self {
        Self {
            shape,
            local_transform,
            shape_type,
        }
    }
}

/// Collision shapes and coarse bounds of one entity
#[derive(Debug, Clone)]
pub struct CollisionData {
    root_transform: Mat4,
    local_aabb: [Vec3; 8],
    world_obb: [Vec3; 8],
    aabb_local_transform: Mat4,
    obb_shape: Shape,
    shapes: Vec<ShapeData>,
}

impl Default for CollisionData {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionData {
    /// Collision data with a unit-cube coarse box and no fine shapes yet
    ///
    /// Add shapes before registering it; [`CollisionWorld::add_body`] gives a
    /// shapeless body its coarse box as the only shape.
    ///
    /// [`CollisionWorld::add_body`]: super::collision_system::CollisionWorld::add_body
    pub fn new() -> Self {
        Self {
            root_transform: Mat4::identity(),
            local_aabb: UNIT_CUBE_CORNERS,
            world_obb: UNIT_CUBE_CORNERS,
            aabb_local_transform: Mat4::identity(),
            obb_shape: Shape::cube(),
            shapes: Vec::new(),
        }
    }

    /// Unit cube for both the coarse box and the single fine shape
    ///
    /// Used whenever a model cannot be loaded, so the entity stays collidable.
    pub fn unit_cube() -> Self {
        let mut data = Self::new();
        data.add_new_collision_shape(ShapeData::new(Shape::cube(), Mat4::identity(), CollisionShapeType::Cube));
        data
    }

    /// Fit the coarse box to a model's vertex extent
    ///
    /// `root_offset` places the model relative to the entity (spawn configs
    /// use it for model position/rotation/scale). An empty model leaves the
    /// box unchanged.
    pub fn set_aabb_to_model_bounds(&mut self, model: &MeshData, root_offset: Option<&Mat4>) {
        match model.aabb() {
            Some(bounds) => self.set_aabb_to_bounds(&bounds, root_offset),
            None => warn!("Model has no vertices; keeping previous collision bounds"),
        }
    }

    /// Fit the coarse box to a local-space extent
    pub fn set_aabb_to_bounds(&mut self, bounds: &Aabb, root_offset: Option<&Mat4>) {
        let root = root_offset.copied().unwrap_or_else(Mat4::identity);
        // Scale the unit cube to the extent and move it onto the extent's center
        let size = bounds.size();
        let aabb_model = root * Mat4::new_translation(&bounds.center()) * Mat4::new_nonuniform_scaling(&size);
        self.local_aabb = transformed_unit_cube(&aabb_model);
        self.aabb_local_transform = aabb_model;
        self.obb_shape = Shape::cube();
        let root_transform = self.root_transform;
        self.refresh_world(&root_transform);
    }

    /// Append a fine-grained shape
    pub fn add_new_collision_shape(&mut self, shape_data: ShapeData) {
        let mut shape_data = shape_data;
        shape_data.shape.update_transform(&(self.root_transform * shape_data.local_transform));
        self.shapes.push(shape_data);
    }

    /// Move everything to a new world model matrix
    ///
    /// Must run before SAT tests or grid updates in the tick the owner moved.
    pub fn update_to_new_world_transform(&mut self, world: &Mat4) {
        self.root_transform = *world;
        for shape_data in &mut self.shapes {
            shape_data.shape.update_transform(&(world * shape_data.local_transform));
        }
        self.refresh_world(world);
    }

    fn refresh_world(&mut self, world: &Mat4) {
        self.obb_shape.update_transform(&(world * self.aabb_local_transform));
        for (world_corner, local_corner) in self.world_obb.iter_mut().zip(&self.local_aabb) {
            *world_corner = utils::transform_point(world, local_corner);
        }
    }

    /// The eight world corners of the coarse box, for broad-phase placement
    pub fn world_obb(&self) -> &[Vec3; 8] {
        &self.world_obb
    }

    /// Axis-aligned extent of the world OBB
    pub fn world_bounds(&self) -> Aabb {
        let mut min = self.world_obb[0];
        let mut max = self.world_obb[0];
        for corner in &self.world_obb[1..] {
            min = min.inf(corner);
            max = max.sup(corner);
        }
        Aabb::new(min, max)
    }

    /// Eight model-space corners of the coarse box
    pub fn local_aabb(&self) -> &[Vec3; 8] {
        &self.local_aabb
    }

    /// Transform taking the unit cube onto the coarse box, in model space
    pub fn aabb_local_transform(&self) -> &Mat4 {
        &self.aabb_local_transform
    }

    /// Cube shape matching the coarse box, for cheap rejection tests
    pub fn obb_shape(&self) -> &Shape {
        &self.obb_shape
    }

    /// Fine-grained shapes in insertion order
    pub fn shapes(&self) -> &[ShapeData] {
        &self.shapes
    }

    /// Model matrix the shapes were last moved to
    pub fn world_transform(&self) -> &Mat4 {
        &self.root_transform
    }

    /// True if every fine shape is a cube, so no mesh test is ever needed
    pub fn requires_only_cube_tests(&self) -> bool {
        self.shapes.iter().all(|s| s.shape_type == CollisionShapeType::Cube)
    }

    /// True once at least one fine shape exists
    pub fn has_shapes(&self) -> bool {
        !self.shapes.is_empty()
    }

    /// Use the coarse box as the fine shape when there is none
    ///
    /// Returns `true` if a shape was added.
    pub fn ensure_shape(&mut self) -> bool {
        if self.has_shapes() {
            return false;
        }
        let aabb_local = self.aabb_local_transform;
        self.add_new_collision_shape(ShapeData::new(Shape::cube(), aabb_local, CollisionShapeType::Cube));
        true
    }

    /// Build from a spawn config, loading the model file if one is named
    ///
    /// A model that fails to load is logged and replaced by a unit cube.
    pub fn from_spawn_config(config: &SpawnCollisionConfig, factory: &ShapeFactory) -> Result<Self, CollisionError> {
        let model = config.model_path.as_ref().and_then(|path| match ObjLoader::load_obj(path) {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                warn!("Failed to load collision model {}: {e}; using unit cube", path.display());
                None
            }
        });
        Self::from_spawn_config_with_model(config, factory, model.as_ref())
    }

    /// Build from a spawn config with already-loaded model triangles
    pub fn from_spawn_config_with_model(
        config: &SpawnCollisionConfig,
        factory: &ShapeFactory,
        model: Option<&MeshData>,
    ) -> Result<Self, CollisionError> {
        let root = config.model_transform().to_matrix();
        let mut data = Self::new();

        for shape_config in &config.shapes {
            let local = root * shape_config.transform().to_matrix();
            let shape = match (shape_config.shape, model) {
                (CollisionShapeType::Model, Some(mesh)) => factory.generate_model_shape(mesh)?,
                (CollisionShapeType::Model, None) => {
                    warn!("Model collision shape without a loaded model; using cube");
                    Shape::cube()
                }
                (shape_type, _) => factory.generate_shape(shape_type)?,
            };
            data.add_new_collision_shape(ShapeData::new(shape, local, shape_config.shape));
        }

        // Shapes still sit at the identity world transform, so their world
        // points are in entity space
        let shape_bounds = Aabb::from_points(data.shapes.iter().flat_map(|s| s.shape.world_points()));
        match (model.and_then(MeshData::aabb), shape_bounds) {
            (Some(bounds), _) => data.set_aabb_to_bounds(&bounds, Some(&root)),
            (None, Some(bounds)) => data.set_aabb_to_bounds(&bounds, None),
            (None, None) => {
                data.set_aabb_to_bounds(&Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5)), Some(&root));
            }
        }

        data.ensure_shape();
        Ok(data)
    }
}

/// Placement of one collision shape inside a spawn config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollisionShapeConfig {
    /// Shape type
    pub shape: CollisionShapeType,
    /// Scale relative to the model
    pub scale: Vec3,
    /// Euler rotation in degrees
    pub rotation_degrees: Vec3,
    /// Offset from the model origin
    pub position: Vec3,
}

impl Default for CollisionShapeConfig {
    fn default() -> Self {
        Self {
            shape: CollisionShapeType::Cube,
            scale: Vec3::repeat(1.0),
            rotation_degrees: Vec3::zeros(),
            position: Vec3::zeros(),
        }
    }
}

impl CollisionShapeConfig {
    /// Local transform of the shape
    pub fn transform(&self) -> Transform {
        Transform::from_degrees(self.position, self.rotation_degrees, self.scale)
    }
}

/// Collision section of an entity spawn config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnCollisionConfig {
    /// OBJ file whose extent defines the coarse box
    pub model_path: Option<PathBuf>,
    /// Model offset from the entity origin
    pub model_position: Vec3,
    /// Model scale
    pub model_scale: Vec3,
    /// Model rotation in degrees
    pub model_rotation_degrees: Vec3,
    /// Fine-grained shapes
    pub shapes: Vec<CollisionShapeConfig>,
}

impl Default for SpawnCollisionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_position: Vec3::zeros(),
            model_scale: Vec3::repeat(1.0),
            model_rotation_degrees: Vec3::zeros(),
            shapes: Vec::new(),
        }
    }
}

impl crate::config::Config for SpawnCollisionConfig {}

impl SpawnCollisionConfig {
    /// Transform placing the model relative to its entity
    pub fn model_transform(&self) -> Transform {
        Transform::from_degrees(self.model_position, self.model_rotation_degrees, self.model_scale)
    }
}
