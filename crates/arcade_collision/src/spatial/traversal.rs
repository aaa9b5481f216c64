//! Cell addressing for the uniform grid
//!
//! Converts world positions and extents into integer cell coordinates and
//! walks the cells a segment passes through (Amanatides & Woo voxel traversal).

use crate::foundation::math::{IVec3, Vec3};

/// Integer coordinate of one grid cell
pub type CellIndex = IVec3;

/// Cell containing `point`: `floor(point / cell_size)` per axis
pub fn cell_index_for(point: &Vec3, cell_size: &Vec3) -> CellIndex {
    CellIndex::new(
        floor_div(point.x, cell_size.x),
        floor_div(point.y, cell_size.y),
        floor_div(point.z, cell_size.z),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn floor_div(value: f32, size: f32) -> i32 {
    (value / size).floor() as i32
}

#[allow(clippy::cast_possible_truncation)]
fn last_cell(min: f32, max: f32, size: f32) -> i32 {
    let first = floor_div(min, size);
    let last = (max / size).ceil() as i32 - 1;
    last.max(first)
}

/// Inclusive box of cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    /// Lowest cell on every axis
    pub min: CellIndex,
    /// Highest cell on every axis (inclusive)
    pub max: CellIndex,
}

impl CellRange {
    /// Cells covered by the axis-aligned extent `[min, max]`
    ///
    /// A bound that ends exactly on a cell boundary does not reach into the
    /// next cell, and a zero-volume bound maps to the single cell holding it.
    pub fn covering(min: &Vec3, max: &Vec3, cell_size: &Vec3) -> Self {
        let low = cell_index_for(min, cell_size);
        let high = CellIndex::new(
            last_cell(min.x, max.x, cell_size.x),
            last_cell(min.y, max.y, cell_size.y),
            last_cell(min.z, max.z, cell_size.z),
        );
        Self { min: low, max: high }
    }

    /// Range holding a single cell
    pub fn single(index: CellIndex) -> Self {
        Self { min: index, max: index }
    }

    /// True if `index` is inside the range
    pub fn contains(&self, index: &CellIndex) -> bool {
        (0..3).all(|axis| index[axis] >= self.min[axis] && index[axis] <= self.max[axis])
    }

    /// Number of cells in the range, saturating at `usize::MAX`
    pub fn len(&self) -> usize {
        (0..3)
            .map(|axis| (i64::from(self.max[axis]) - i64::from(self.min[axis]) + 1).max(0))
            .try_fold(1usize, |count, span| usize::try_from(span).ok().and_then(|s| count.checked_mul(s)))
            .unwrap_or(usize::MAX)
    }

    /// Always false; a range holds at least one cell
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every cell, x fastest
    pub fn iter(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (self.min.z..=self.max.z).flat_map(move |z| {
            (self.min.y..=self.max.y).flat_map(move |y| {
                (self.min.x..=self.max.x).map(move |x| CellIndex::new(x, y, z))
            })
        })
    }
}

/// Iterator over the cells a segment crosses, start cell first, end cell last
///
/// Every step advances one axis toward the end cell, so the walk always
/// terminates on the end cell even when float error accumulates, and a
/// zero-length segment yields exactly one cell.
#[derive(Debug, Clone)]
pub struct LineTraversal {
    current: CellIndex,
    end: CellIndex,
    step: CellIndex,
    t_max: Vec3,
    t_delta: Vec3,
    remaining: u32,
    started: bool,
}

impl LineTraversal {
    /// Prepare a walk from `start` to `end`
    #[allow(clippy::cast_precision_loss)]
    pub fn new(start: &Vec3, end: &Vec3, cell_size: &Vec3) -> Self {
        let current = cell_index_for(start, cell_size);
        let end_cell = cell_index_for(end, cell_size);
        let delta = end - start;

        let mut step = CellIndex::zeros();
        let mut t_max = Vec3::repeat(f32::INFINITY);
        let mut t_delta = Vec3::repeat(f32::INFINITY);

        for axis in 0..3 {
            let size = cell_size[axis];
            // t is measured in segment parameter space, 0 at start and 1 at end
            if delta[axis] > 0.0 {
                step[axis] = 1;
                let boundary = (current[axis] + 1) as f32 * size;
                t_max[axis] = (boundary - start[axis]) / delta[axis];
                t_delta[axis] = size / delta[axis];
            } else if delta[axis] < 0.0 {
                step[axis] = -1;
                let boundary = current[axis] as f32 * size;
                t_max[axis] = (start[axis] - boundary) / -delta[axis];
                t_delta[axis] = size / -delta[axis];
            }
        }

        let remaining = (end_cell - current).iter().map(|&d| d.unsigned_abs()).sum();

        Self {
            current,
            end: end_cell,
            step,
            t_max,
            t_delta,
            remaining,
            started: false,
        }
    }

    fn advance(&mut self) {
        let mut best_axis = None;
        for axis in 0..3 {
            if self.current[axis] == self.end[axis] {
                continue;
            }
            match best_axis {
                Some(best) if self.t_max[best] <= self.t_max[axis] => {}
                _ => best_axis = Some(axis),
            }
        }

        if let Some(axis) = best_axis {
            let toward_end = (self.end[axis] - self.current[axis]).signum();
            // Degenerate deltas can leave step at 0; the end cell still decides direction
            let step = if self.step[axis] == 0 { toward_end } else { self.step[axis] };
            self.current[axis] += step;
            self.t_max[axis] += self.t_delta[axis];
        }
    }
}

impl Iterator for LineTraversal {
    type Item = CellIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return Some(self.current);
        }
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.advance();
        Some(self.current)
    }
}
