//! Uniform spatial hash grid for broad-phase collision
//!
//! World space is cut into equally sized cells. Every inserted element is
//! referenced from each cell its axis-aligned bound overlaps, so region and
//! segment queries only touch the cells they cover instead of every element.
//!
//! Storage is arena based: entries live in one slot map and cells in another.
//! A cell bucket lists the [`EntryKey`]s overlapping it, and each entry keeps
//! the exact list of cell coordinates it was filed under. The [`HashEntry`]
//! handle returned by [`SpatialHashGrid::insert`] wraps a generational key, so
//! using it after removal is detected instead of touching a recycled slot.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use log::{debug, trace};

use crate::config::GridConfig;
use crate::foundation::collections::{new_key_type, RecyclePool, SlotMap};
use crate::foundation::math::Vec3;
use super::bounds::Aabb;
use super::traversal::{cell_index_for, CellIndex, CellRange, LineTraversal};

new_key_type! {
    /// Arena key of one grid entry
    pub struct EntryKey;
    /// Arena key of one cell bucket
    pub struct CellKey;
}

/// Errors raised while building a grid
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// Cell size must be positive and finite on every axis
    #[error("invalid grid cell size {0:?}")]
    InvalidCellSize(Vec3),
}

/// An element filed in the grid, with its cached world bound
#[derive(Debug, Clone)]
pub struct GridNode<T> {
    element: T,
    bounds: Aabb,
    range: CellRange,
    cells: Vec<CellIndex>,
}

impl<T> GridNode<T> {
    /// The element this node stands for
    pub fn element(&self) -> &T {
        &self.element
    }

    /// World bound the node was last filed with
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Cells the node is currently filed under
    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }
}

/// One bucket of the grid
#[derive(Debug, Clone)]
pub struct HashCell {
    index: CellIndex,
    nodes: Vec<EntryKey>,
}

impl HashCell {
    /// Coordinate of the cell
    pub fn index(&self) -> CellIndex {
        self.index
    }

    /// Entries overlapping this cell, in insertion order
    pub fn nodes(&self) -> &[EntryKey] {
        &self.nodes
    }

    /// Number of entries in the bucket
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no entry references this cell
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Handle to an inserted element
///
/// Owned by whoever inserted the element. The grid never drops entries on its
/// own; call [`SpatialHashGrid::remove`] when the owner is destroyed.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping a HashEntry leaks the element in the grid; remove it explicitly"]
pub struct HashEntry<T> {
    key: EntryKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HashEntry<T> {
    /// Arena key of the entry, usable as a stable id while the entry is live
    pub fn key(&self) -> EntryKey {
        self.key
    }
}

#[derive(Debug)]
struct CellStore {
    cells: SlotMap<CellKey, HashCell>,
    lookup: HashMap<CellIndex, CellKey>,
    bucket_pool: RecyclePool<Vec<EntryKey>>,
}

impl CellStore {
    fn attach(&mut self, index: CellIndex, entry: EntryKey) {
        let key = match self.lookup.get(&index) {
            Some(&key) => key,
            None => {
                let nodes = self.bucket_pool.acquire_or_else(Vec::new);
                let key = self.cells.insert(HashCell { index, nodes });
                self.lookup.insert(index, key);
                key
            }
        };
        self.cells[key].nodes.push(entry);
    }

    fn detach(&mut self, index: CellIndex, entry: EntryKey) {
        let Some(&key) = self.lookup.get(&index) else {
            debug!("Cell {index:?} missing while detaching {entry:?}");
            return;
        };
        let cell = &mut self.cells[key];
        if let Some(position) = cell.nodes.iter().position(|k| *k == entry) {
            cell.nodes.remove(position);
        }
        if cell.nodes.is_empty() {
            self.lookup.remove(&index);
            if let Some(mut cell) = self.cells.remove(key) {
                cell.nodes.clear();
                self.bucket_pool.release(cell.nodes);
            }
        }
    }

    fn get(&self, index: &CellIndex) -> Option<&HashCell> {
        self.lookup.get(index).map(|key| &self.cells[*key])
    }
}

/// Uniform 3D grid of cell buckets
#[derive(Debug)]
pub struct SpatialHashGrid<T> {
    cell_size: Vec3,
    store: CellStore,
    entries: SlotMap<EntryKey, GridNode<T>>,
}

impl<T> SpatialHashGrid<T> {
    /// Create a grid with a fixed cell size
    pub fn new(cell_size: Vec3) -> Result<Self, GridError> {
        let valid = cell_size.iter().all(|c| c.is_finite() && *c > 0.0);
        if !valid {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            store: CellStore {
                cells: SlotMap::with_key(),
                lookup: HashMap::new(),
                bucket_pool: RecyclePool::default(),
            },
            entries: SlotMap::with_key(),
        })
    }

    /// Create a grid from configuration
    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        Self::new(config.cell_size)
    }

    /// Size of one cell
    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    /// Cell containing a world position
    pub fn cell_index_for(&self, point: &Vec3) -> CellIndex {
        cell_index_for(point, &self.cell_size)
    }

    /// World-space box of a cell
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_bounds(&self, index: &CellIndex) -> Aabb {
        let min = Vec3::new(index.x as f32, index.y as f32, index.z as f32).component_mul(&self.cell_size);
        Aabb::new(min, min + self.cell_size)
    }

    /// File an element under every cell its bound overlaps
    ///
    /// Inserting the same element twice creates two independent entries,
    /// each with its own handle. Queries may then report it twice.
    pub fn insert(&mut self, element: T, bounds: Aabb) -> HashEntry<T> {
        let range = CellRange::covering(&bounds.min, &bounds.max, &self.cell_size);
        let cells: Vec<CellIndex> = range.iter().collect();
        let key = self.entries.insert(GridNode {
            element,
            bounds,
            range,
            cells,
        });
        for index in range.iter() {
            self.store.attach(index, key);
        }
        trace!("Inserted {key:?} into {} cell(s)", range.len());
        HashEntry {
            key,
            _marker: PhantomData,
        }
    }

    /// Insert using the eight world corners of an oriented box
    pub fn insert_obb(&mut self, element: T, corners: &[Vec3; 8]) -> HashEntry<T> {
        self.insert(element, obb_extent(corners))
    }

    /// Refile an entry after its bound changed
    ///
    /// Cells covered both before and after keep their bucket untouched.
    /// Returns `false` for a handle that was already removed.
    pub fn update_entry(&mut self, entry: &HashEntry<T>, bounds: Aabb) -> bool {
        let Some(node) = self.entries.get_mut(entry.key) else {
            debug!("update_entry on stale handle {:?}", entry.key);
            return false;
        };
        node.bounds = bounds;
        let new_range = CellRange::covering(&bounds.min, &bounds.max, &self.cell_size);
        let old_range = node.range;
        if new_range == old_range {
            return true;
        }

        for index in old_range.iter().filter(|i| !new_range.contains(i)) {
            self.store.detach(index, entry.key);
        }
        for index in new_range.iter().filter(|i| !old_range.contains(i)) {
            self.store.attach(index, entry.key);
        }

        node.range = new_range;
        node.cells.clear();
        node.cells.extend(new_range.iter());
        true
    }

    /// Refile an entry from the eight world corners of an oriented box
    pub fn update_entry_obb(&mut self, entry: &HashEntry<T>, corners: &[Vec3; 8]) -> bool {
        self.update_entry(entry, obb_extent(corners))
    }

    /// Erase an entry from every cell it occupies, returning its element
    ///
    /// Removing an entry twice is a no-op that returns `None`.
    pub fn remove(&mut self, entry: &HashEntry<T>) -> Option<T> {
        let Some(node) = self.entries.remove(entry.key) else {
            debug!("remove on stale handle {:?}; ignoring", entry.key);
            return None;
        };
        for index in &node.cells {
            self.store.detach(*index, entry.key);
        }
        Some(node.element)
    }

    /// True while the handle refers to a live entry
    pub fn contains(&self, entry: &HashEntry<T>) -> bool {
        self.entries.contains_key(entry.key)
    }

    /// Node for an arena key
    pub fn node(&self, key: EntryKey) -> Option<&GridNode<T>> {
        self.entries.get(key)
    }

    /// Element filed under a handle
    pub fn element(&self, entry: &HashEntry<T>) -> Option<&T> {
        self.entries.get(entry.key).map(GridNode::element)
    }

    /// Mutable access to the element filed under a handle
    pub fn element_mut(&mut self, entry: &HashEntry<T>) -> Option<&mut T> {
        self.entries.get_mut(entry.key).map(|node| &mut node.element)
    }

    /// Bucket at a cell coordinate, if any entry overlaps it
    pub fn cell(&self, index: &CellIndex) -> Option<&HashCell> {
        self.store.get(index)
    }

    /// All non-empty cells
    pub fn cells(&self) -> impl Iterator<Item = &HashCell> {
        self.store.cells.values()
    }

    /// Nodes referenced by a cell
    pub fn nodes_in<'a>(&'a self, cell: &'a HashCell) -> impl Iterator<Item = (EntryKey, &'a GridNode<T>)> + 'a {
        cell.nodes
            .iter()
            .filter_map(move |key| self.entries.get(*key).map(|node| (*key, node)))
    }

    /// Existing cells overlapping an axis-aligned region
    pub fn lookup_cells_for_aabb<'a>(&'a self, bounds: &Aabb, out: &mut Vec<&'a HashCell>) {
        let range = CellRange::covering(&bounds.min, &bounds.max, &self.cell_size);
        if range.len() > self.store.cells.len() {
            // Region larger than the populated grid: scan the buckets instead
            out.extend(self.store.cells.values().filter(|cell| range.contains(&cell.index)));
        } else {
            out.extend(range.iter().filter_map(|index| self.store.get(&index)));
        }
    }

    /// Existing cells overlapping the axis-aligned extent of an oriented box
    pub fn lookup_cells_for_oob<'a>(&'a self, corners: &[Vec3; 8], out: &mut Vec<&'a HashCell>) {
        self.lookup_cells_for_aabb(&obb_extent(corners), out);
    }

    /// Existing cells a segment passes through, in travel order
    ///
    /// The cells holding `start` and `end` are always visited, so a
    /// zero-length segment reports the single cell containing its point.
    pub fn lookup_cells_for_line<'a>(&'a self, start: &Vec3, end: &Vec3, out: &mut Vec<&'a HashCell>) {
        out.extend(
            LineTraversal::new(start, end, &self.cell_size).filter_map(|index| self.store.get(&index)),
        );
    }

    /// Cells recorded for an entry
    pub fn lookup_cells_for_entry<'a>(&'a self, entry: &HashEntry<T>, out: &mut Vec<&'a HashCell>) {
        if let Some(node) = self.entries.get(entry.key) {
            out.extend(node.cells.iter().filter_map(|index| self.store.get(index)));
        }
    }

    /// Other entries sharing at least one cell with `entry`, each reported once
    pub fn lookup_nodes_in_cells(&self, entry: &HashEntry<T>, out: &mut Vec<EntryKey>) {
        let Some(node) = self.entries.get(entry.key) else {
            return;
        };
        let mut seen = HashSet::new();
        for cell in node.cells.iter().filter_map(|index| self.store.get(index)) {
            for key in &cell.nodes {
                if *key != entry.key && seen.insert(*key) {
                    out.push(*key);
                }
            }
        }
    }

    /// Number of live entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.store.cells.len()
    }

    /// Remove everything; all outstanding handles become stale
    pub fn clear(&mut self) {
        for (_, mut cell) in self.store.cells.drain() {
            cell.nodes.clear();
            self.store.bucket_pool.release(cell.nodes);
        }
        self.store.lookup.clear();
        self.entries.clear();
    }
}

fn obb_extent(corners: &[Vec3; 8]) -> Aabb {
    let mut min = corners[0];
    let mut max = corners[0];
    for corner in &corners[1..] {
        min = min.inf(corner);
        max = max.sup(corner);
    }
    Aabb::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(size: f32) -> SpatialHashGrid<u32> {
        SpatialHashGrid::new(Vec3::repeat(size)).unwrap()
    }

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_extents(center, Vec3::repeat(half))
    }

    fn sorted_indices(cells: &[&HashCell]) -> Vec<(i32, i32, i32)> {
        let mut indices: Vec<_> = cells.iter().map(|c| (c.index().x, c.index().y, c.index().z)).collect();
        indices.sort_unstable();
        indices
    }

    fn cell_holds(grid: &SpatialHashGrid<u32>, index: CellIndex, key: EntryKey) -> bool {
        grid.cell(&index).is_some_and(|cell| cell.nodes().contains(&key))
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        assert!(SpatialHashGrid::<u32>::new(Vec3::new(2.0, 0.0, 2.0)).is_err());
        assert!(SpatialHashGrid::<u32>::new(Vec3::new(2.0, f32::NAN, 2.0)).is_err());
    }

    #[test]
    fn test_move_between_cells() {
        let mut grid = grid(2.0);
        let entry = grid.insert(7, cube(Vec3::new(1.0, 1.0, 1.0), 0.4));
        assert_eq!(grid.node(entry.key()).unwrap().cells(), &[CellIndex::new(0, 0, 0)]);

        // Translate by (2, 2, 2): center lands on (3, 3, 3)
        assert!(grid.update_entry(&entry, cube(Vec3::new(3.0, 3.0, 3.0), 0.4)));
        assert_eq!(grid.node(entry.key()).unwrap().cells(), &[CellIndex::new(1, 1, 1)]);
        assert!(grid.cell(&CellIndex::new(0, 0, 0)).is_none());
        assert!(cell_holds(&grid, CellIndex::new(1, 1, 1), entry.key()));
    }

    #[test]
    fn test_huge_region_lookup_scans_buckets() {
        let mut grid = grid(1.0);
        grid.insert(3, cube(Vec3::new(0.5, 0.5, 0.5), 0.25));

        let mut cells = Vec::new();
        grid.lookup_cells_for_aabb(&Aabb::new(Vec3::repeat(-1.0e7), Vec3::repeat(1.0e7)), &mut cells);
        assert_eq!(sorted_indices(&cells), vec![(0, 0, 0)]);
    }

    #[test]
    fn test_oob_lookup_matches_recorded_cells() {
        let mut grid = grid(2.0);
        let bounds = Aabb::new(Vec3::new(-1.5, 0.2, 0.2), Vec3::new(2.5, 3.0, 0.8));
        let entry = grid.insert(1, cube(Vec3::zeros(), 0.1));
        grid.update_entry(&entry, bounds);

        let mut by_oob = Vec::new();
        grid.lookup_cells_for_oob(&bounds.corners(), &mut by_oob);
        let mut by_entry = Vec::new();
        grid.lookup_cells_for_entry(&entry, &mut by_entry);

        assert_eq!(sorted_indices(&by_oob), sorted_indices(&by_entry));
        assert_eq!(by_entry.len(), 3 * 2);
    }

    #[test]
    fn test_remove_clears_every_bucket() {
        let mut grid = grid(2.0);
        let keep = grid.insert(1, cube(Vec3::new(1.0, 1.0, 1.0), 0.5));
        let gone = grid.insert(2, Aabb::new(Vec3::new(-3.0, -3.0, -3.0), Vec3::new(3.0, 3.0, 3.0)));
        assert_eq!(grid.remove(&gone), Some(2));

        for cell in grid.cells() {
            assert!(!cell.nodes().contains(&gone.key()));
        }
        assert_eq!(grid.cell_count(), 1);
        assert!(grid.contains(&keep));
        assert!(!grid.contains(&gone));
    }

    #[test]
    fn test_double_remove_is_noop() {
        let mut grid = grid(2.0);
        let entry = grid.insert(5, cube(Vec3::zeros(), 0.5));
        assert_eq!(grid.remove(&entry), Some(5));
        assert_eq!(grid.remove(&entry), None);
        assert!(!grid.update_entry(&entry, cube(Vec3::zeros(), 0.5)));
        assert_eq!(grid.entry_count(), 0);
        assert_eq!(grid.cell_count(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut grid = grid(2.0);
        let old = grid.insert(1, cube(Vec3::zeros(), 0.5));
        grid.remove(&old);
        let new = grid.insert(2, cube(Vec3::zeros(), 0.5));
        assert_eq!(grid.element(&old), None);
        assert_eq!(grid.element(&new), Some(&2));
    }

    #[test]
    fn test_update_with_same_bound_is_idempotent() {
        let mut grid = grid(2.0);
        let bounds = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let entry = grid.insert(3, bounds);
        let before: Vec<_> = grid.cells().map(|c| (c.index(), c.nodes().to_vec())).collect();

        grid.update_entry(&entry, bounds);
        grid.update_entry(&entry, bounds);

        let after: Vec<_> = grid.cells().map(|c| (c.index(), c.nodes().to_vec())).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_partial_overlap_keeps_shared_cells() {
        let mut grid = grid(2.0);
        let other = grid.insert(9, cube(Vec3::new(1.0, 1.0, 1.0), 0.1));
        let entry = grid.insert(1, Aabb::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(3.5, 1.5, 1.5)));

        grid.update_entry(&entry, Aabb::new(Vec3::new(2.5, 0.5, 0.5), Vec3::new(5.5, 1.5, 1.5)));

        // Shared cell (1,0,0) keeps its order; (0,0,0) loses the entry but keeps `other`
        assert!(cell_holds(&grid, CellIndex::new(1, 0, 0), entry.key()));
        assert!(cell_holds(&grid, CellIndex::new(2, 0, 0), entry.key()));
        assert!(!cell_holds(&grid, CellIndex::new(0, 0, 0), entry.key()));
        assert!(cell_holds(&grid, CellIndex::new(0, 0, 0), other.key()));
    }

    #[test]
    fn test_line_lookup_degenerate() {
        let mut grid = grid(2.0);
        let entry = grid.insert(4, cube(Vec3::new(5.0, 5.0, 5.0), 3.0));
        let p = Vec3::new(4.5, 4.5, 4.5);

        let mut cells = Vec::new();
        grid.lookup_cells_for_line(&p, &p, &mut cells);

        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].index(), grid.cell_index_for(&p));
        assert!(cells[0].nodes().contains(&entry.key()));
    }

    #[test]
    fn test_line_lookup_skips_empty_cells() {
        let mut grid = grid(2.0);
        let _near = grid.insert(1, cube(Vec3::new(1.0, 1.0, 1.0), 0.5));
        let _far = grid.insert(2, cube(Vec3::new(9.0, 1.0, 1.0), 0.5));
        let _off = grid.insert(3, cube(Vec3::new(5.0, 9.0, 1.0), 0.5));

        let mut cells = Vec::new();
        grid.lookup_cells_for_line(&Vec3::new(0.5, 1.0, 1.0), &Vec3::new(9.5, 1.0, 1.0), &mut cells);

        let indices: Vec<_> = cells.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![CellIndex::new(0, 0, 0), CellIndex::new(4, 0, 0)]);
    }

    #[test]
    fn test_double_insert_creates_independent_entries() {
        let mut grid = grid(2.0);
        let first = grid.insert(1, cube(Vec3::new(1.0, 1.0, 1.0), 0.5));
        let second = grid.insert(1, cube(Vec3::new(1.0, 1.0, 1.0), 0.5));
        assert_ne!(first.key(), second.key());
        assert_eq!(grid.cell(&CellIndex::zeros()).unwrap().len(), 2);

        grid.remove(&first);
        assert_eq!(grid.element(&second), Some(&1));
    }

    #[test]
    fn test_nearby_nodes_are_unique_and_exclude_self() {
        let mut grid = grid(2.0);
        let wide = grid.insert(1, Aabb::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(3.5, 1.5, 1.5)));
        let spanning = grid.insert(2, Aabb::new(Vec3::new(1.5, 0.5, 0.5), Vec3::new(2.5, 1.5, 1.5)));
        let _distant = grid.insert(3, cube(Vec3::new(21.0, 1.0, 1.0), 0.5));

        let mut nearby = Vec::new();
        grid.lookup_nodes_in_cells(&wide, &mut nearby);
        assert_eq!(nearby, vec![spanning.key()]);
    }

    #[test]
    fn test_large_region_lookup_scans_buckets() {
        let mut grid = grid(1.0);
        let _a = grid.insert(1, cube(Vec3::new(0.5, 0.5, 0.5), 0.1));
        let _b = grid.insert(2, cube(Vec3::new(-40.5, 0.5, 0.5), 0.1));

        let mut cells = Vec::new();
        grid.lookup_cells_for_aabb(
            &Aabb::new(Vec3::repeat(-100.0), Vec3::repeat(100.0)),
            &mut cells,
        );
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut grid = grid(2.0);
        let entry = grid.insert(1, cube(Vec3::zeros(), 1.0));
        grid.clear();
        assert!(!grid.contains(&entry));
        assert_eq!(grid.cell_count(), 0);
    }
}
