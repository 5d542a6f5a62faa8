// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The histogram: row compaction and the canonical metamodule goal shape.
//!
//! When the sweep reaches the western wall the configuration is a stack of
//! rows. `compact_step` proposes one westward slide for every module east
//! of its row's first gap; repeating until the proposal set comes back
//! empty left-packs every row. `ideal_shape` then lays out the canonical
//! left-packed 3×3 metamodule grid that Phase 4 fills.

use std::collections::BTreeSet;

use crate::cell::{Bounds, Cell};
use crate::environment::PlanView;
use crate::motion::{ModuleId, Move, MoveSet};

/// Row view of a configuration, topmost row first.
///
/// Each row spans from the west wall to its eastmost module; gaps are
/// `None`. Rows are rebuilt from the view on construction and hold ids
/// only.
#[derive(Debug, Clone)]
pub struct Histogram {
    rows: Vec<Vec<Option<ModuleId>>>,
    bounds: Bounds,
}

impl Histogram {
    /// Captures the row structure of `view`; `None` when it is empty.
    #[must_use]
    pub fn from_view(view: &PlanView) -> Option<Self> {
        let bounds = view.bounds()?;
        let mut rows = Vec::with_capacity(bounds.height() as usize);
        for y in (bounds.min_y..=bounds.max_y).rev() {
            let mut row = Vec::new();
            let mut seen_module = false;
            for x in (bounds.min_x..=bounds.max_x).rev() {
                let entry = view.module_at(Cell::new(x, y));
                if entry.is_some() {
                    seen_module = true;
                }
                if seen_module {
                    row.insert(0, entry);
                }
            }
            rows.push(row);
        }
        Some(Self { rows, bounds })
    }

    /// The captured rows, topmost first.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<ModuleId>>] {
        &self.rows
    }

    /// The bounds the rows were captured over.
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Occupied-cell count per column, west to east.
    #[must_use]
    pub fn column_heights(&self, view: &PlanView) -> Vec<u32> {
        (self.bounds.min_x..=self.bounds.max_x)
            .map(|x| {
                (self.bounds.min_y..=self.bounds.max_y)
                    .filter(|&y| view.is_occupied(Cell::new(x, y)))
                    .count() as u32
            })
            .collect()
    }

    /// Returns true when every row is left-packed (no module east of a gap).
    #[must_use]
    pub fn is_left_packed(&self) -> bool {
        self.rows.iter().all(|row| {
            let mut seen_gap = false;
            for entry in row {
                match entry {
                    None => seen_gap = true,
                    Some(_) if seen_gap => return false,
                    Some(_) => {}
                }
            }
            true
        })
    }

    /// One compaction step: every module east of its row's first gap slides
    /// west. An empty result means the histogram is fully packed.
    #[must_use]
    pub fn compact_step(&self) -> MoveSet {
        let mut step = MoveSet::new();
        for row in &self.rows {
            let mut seen_gap = false;
            for entry in row {
                match entry {
                    None => seen_gap = true,
                    Some(id) if seen_gap => step.insert(*id, Move::West),
                    Some(_) => {}
                }
            }
        }
        step
    }
}

/// The canonical goal positions for `n` modules over `bounds`.
///
/// Full 9-cell metamodule blocks stack column-major (south to north, then
/// east one block column) over `ceil(height / 3)` block rows anchored at
/// the south-west corner. The remainder `n % 9` fills the next block
/// row-major from its south-west cell.
#[must_use]
pub fn ideal_shape(n: usize, bounds: Bounds) -> BTreeSet<Cell> {
    let mut goals = BTreeSet::new();
    if n == 0 {
        return goals;
    }
    let block_rows = (bounds.height().div_ceil(3)).max(1) as usize;
    let full_blocks = n / 9;
    let remainder = n % 9;

    let block_cell = |col: usize, row: usize, dx: i32, dy: i32| {
        Cell::new(
            bounds.min_x + (col as i32) * 3 + dx,
            bounds.min_y + (row as i32) * 3 + dy,
        )
    };

    for block in 0..full_blocks {
        let col = block / block_rows;
        let row = block % block_rows;
        for dy in 0..3 {
            for dx in 0..3 {
                let _ = goals.insert(block_cell(col, row, dx, dy));
            }
        }
    }
    if remainder > 0 {
        let col = full_blocks / block_rows;
        let row = full_blocks % block_rows;
        let mut placed = 0;
        'fill: for dy in 0..3 {
            for dx in 0..3 {
                if placed == remainder {
                    break 'fill;
                }
                let _ = goals.insert(block_cell(col, row, dx, dy));
                placed += 1;
            }
        }
    }
    goals
}
