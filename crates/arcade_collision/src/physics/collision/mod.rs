//! Narrow-phase collision geometry
//!
//! # Module Organization
//!
//! - [`primitives`] - Rays, triangles and projection intervals
//! - [`shape`] - Convex shapes with shared local geometry and per-instance world transforms
//! - [`mesh`] - Triangle lists processed into SAT geometry
//! - [`sat`] - The separating-axis overlap test and minimum translation vector

pub mod primitives;
pub mod shape;
pub mod mesh;
pub mod sat;

pub use primitives::{ProjectionRange, Ray, Triangle};
pub use shape::{transformed_unit_cube, Edge, Face, Shape, ShapeGeometry, ShapeKind};
pub use mesh::{triangles_from_indexed, TriangleProcessor};
pub use sat::{collision_test, collision_test_with, overlaps, Mtv, SatScratch};
