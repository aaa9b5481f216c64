//! Debug visualization of collision state

pub mod draw;
pub mod collision_debug;

pub use draw::{DebugDraw, DebugDrawSystem, DebugShape, DebugShapeId};
pub use collision_debug::{CollisionDebugColors, CollisionDebugFlags, CollisionDebugVisualizer};
