//! Asset loading
//!
//! Collision only needs triangle data, read here from OBJ files.

pub mod obj_loader;

pub use obj_loader::{MeshData, ObjError, ObjLoader};
