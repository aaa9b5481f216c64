//! # Arcade Collision
//!
//! Collision detection for a space-combat arcade game: a uniform spatial hash
//! grid for the broad phase, SAT over convex shapes for the narrow phase, and
//! on top of both, projectile sweeps and mouse picking.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcade_collision::prelude::*;
//!
//! fn main() -> Result<(), CollisionError> {
//!     let config = CollisionConfig::default();
//!     let mut world = CollisionWorld::new(&config)?;
//!
//!     let mut fighter = CollisionData::unit_cube();
//!     fighter.update_to_new_world_transform(&Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0)));
//!     world.add_body(fighter, CollisionFilter::ship());
//!
//!     let mut projectiles = ProjectileSystem::new(config.projectile.clone());
//!     projectiles.spawn(&ProjectileSpawn {
//!         direction: Vec3::new(0.0, 0.0, -1.0),
//!         speed: 200.0,
//!         ..Default::default()
//!     });
//!     projectiles.tick(1.0 / 60.0, &world, &mut |hit: &ProjectileHit| {
//!         log::info!("hit {:?} at {:?}", hit.body, hit.location);
//!     });
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod spatial;
pub mod physics;
pub mod assets;
pub mod debug;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        assets::{MeshData, ObjLoader},
        config::{CollisionConfig, Config},
        debug::{CollisionDebugVisualizer, DebugDraw, DebugDrawSystem},
        foundation::math::{Mat4, Quat, Transform, Vec2, Vec3, Vec4},
        physics::{
            picking::CameraView, BodyKey, CollisionData, CollisionError, CollisionFilter, CollisionLayers,
            CollisionLookup, CollisionShapeType, CollisionWorld, Mtv, ObjectPicker, PickHit, ProjectileHit,
            ProjectileHitNotifiable, ProjectileSpawn, ProjectileSystem, Ray, Shape, ShapeData, ShapeFactory,
            SpawnCollisionConfig,
        },
        spatial::{Aabb, HashEntry, SpatialHashGrid},
    };
}
