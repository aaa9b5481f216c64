//! Physics module: collision detection for the arcade simulation
//!
//! Broad phase runs on the uniform [`SpatialHashGrid`](crate::spatial::SpatialHashGrid),
//! narrow phase on SAT over convex [`Shape`](collision::Shape)s. Built on top
//! of both are the per-tick overlap system, projectile sweeps and mouse picking.

pub mod collision;
pub mod collision_data;
pub mod collision_layers;
pub mod collision_system;
pub mod picking;
pub mod projectile;
pub mod shape_factory;

#[cfg(test)]
mod tests;

use crate::assets::ObjError;
use crate::config::ConfigError;
use crate::spatial::GridError;

pub use collision::{collision_test, Mtv, Ray, SatScratch, Shape, ShapeKind, Triangle, TriangleProcessor};
pub use collision_data::{CollisionData, CollisionShapeConfig, CollisionShapeType, ShapeData, SpawnCollisionConfig};
pub use collision_layers::{CollisionFilter, CollisionLayers};
pub use collision_system::{BodyKey, CollisionLookup, CollisionPair, CollisionWorld, Contact};
pub use picking::{ObjectPicker, PickHit};
pub use shape_factory::ShapeFactory;
pub use projectile::{
    Projectile, ProjectileHit, ProjectileHitNotifiable, ProjectileKey, ProjectileSpawn, ProjectileState,
    ProjectileStepper, ProjectileSystem,
};

/// Errors raised while building collision state
///
/// Only construction can fail. Queries report misses through `Option`s and
/// empty results instead.
#[derive(thiserror::Error, Debug)]
pub enum CollisionError {
    /// A triangle-mesh shape needs at least one triangle
    #[error("cannot build a collision shape from a mesh with no triangles")]
    EmptyMesh,

    /// Every triangle was degenerate, leaving no face axis
    #[error("mesh has no triangle with a usable face normal")]
    DegenerateMesh,

    /// Index buffer length is not a multiple of three
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    /// A triangle references a vertex that does not exist
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices available
        vertex_count: usize,
    },

    /// The factory has no geometry for a mesh-backed shape type
    #[error("no geometry registered for collision shape '{0}'")]
    MissingShapeGeometry(CollisionShapeType),

    /// A model shape was requested without model triangles
    #[error("model collision shape requested without a model")]
    MissingModel,

    /// Grid construction failed
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Model file could not be read
    #[error(transparent)]
    Obj(#[from] ObjError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}
