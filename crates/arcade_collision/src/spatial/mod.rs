//! Spatial partitioning data structures
//!
//! Provides the uniform hash grid used for broad-phase collision, plus the
//! cell addressing and segment traversal it is built on.

pub mod bounds;
pub mod hash_grid;
pub mod traversal;

pub use bounds::{Aabb, BOX_EDGES, UNIT_CUBE_CORNERS};
pub use hash_grid::{CellKey, EntryKey, GridError, GridNode, HashCell, HashEntry, SpatialHashGrid};
pub use traversal::{cell_index_for, CellIndex, CellRange, LineTraversal};
