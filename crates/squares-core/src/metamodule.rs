// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The 3×3 metamodule: predicates and the clean / advance / gather scripts.
//!
//! A metamodule is a 3×3 window anchored at its center cell. It never owns
//! modules; every operation re-resolves ids from the view it is handed, so
//! a metamodule value stays valid across environment mutations.
//!
//! Scripts are small fixed sequences of simultaneous sub-steps. Their
//! ordering is chosen so that at every sub-step the stationary remainder of
//! the ring is one contiguous arc, which is exactly what the backbone check
//! demands even when the metamodule has no neighbors.

use crate::cell::Cell;
use crate::environment::PlanView;
use crate::motion::{Move, MoveSet};

/// Scheduling role of a metamodule inside its sweep line.
///
/// Adjacent metamodules alternate roles; leading metamodules flush their
/// scripts first, trailing ones run the mirrored variants afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Flushes first, primary script order (top row first).
    Leading,
    /// Flushes second, mirrored script order (bottom row first).
    Trailing,
}

/// Which west-strip row the clean script pushes the center module into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanVariant {
    /// Shortest row is the top row; the center leaves north-west.
    Top,
    /// Shortest row is the middle row; the center leaves straight west.
    Middle,
    /// Shortest row is the bottom row; the center leaves south-west.
    Bottom,
}

/// Result of planning a clean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    /// The center is already empty.
    AlreadyClean,
    /// The west strip is full or the west wall is reached; nothing to do.
    Done,
    /// Run these sub-steps in order, one executor step each.
    Scripts(CleanVariant, Vec<MoveSet>),
}

/// A 3×3 window anchored at `center`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaModule {
    /// The anchor cell `(cx, cy)`.
    pub center: Cell,
}

impl MetaModule {
    /// Creates the window anchored at `center`.
    #[must_use]
    pub const fn new(center: Cell) -> Self {
        Self { center }
    }

    /// The nine window cells, row-major from the north-west corner.
    #[must_use]
    pub fn cells(&self) -> [Cell; 9] {
        let c = self.center;
        [
            c.offset(-1, 1),
            c.offset(0, 1),
            c.offset(1, 1),
            c.offset(-1, 0),
            c,
            c.offset(1, 0),
            c.offset(-1, -1),
            c.offset(0, -1),
            c.offset(1, -1),
        ]
    }

    /// All nine cells occupied.
    #[must_use]
    pub fn is_solid(&self, view: &PlanView) -> bool {
        self.cells().iter().all(|c| view.is_occupied(*c))
    }

    /// Eight ring cells occupied, center empty.
    #[must_use]
    pub fn is_clean(&self, view: &PlanView) -> bool {
        !view.is_occupied(self.center)
            && self
                .cells()
                .iter()
                .filter(|c| **c != self.center)
                .all(|c| view.is_occupied(*c))
    }

    /// Solid or clean.
    #[must_use]
    pub fn is_valid(&self, view: &PlanView) -> bool {
        self.is_solid(view) || self.is_clean(view)
    }

    /// Separator test over the east strip up to `east_limit` inclusive.
    ///
    /// Each of the three window rows may contain at most one contiguous
    /// empty segment east of the window; more than one means the sweep has
    /// left a hole behind that it can no longer reach.
    #[must_use]
    pub fn is_separator(&self, view: &PlanView, east_limit: i32) -> bool {
        for dy in -1..=1 {
            let y = self.center.y + dy;
            let mut segments = 0;
            let mut in_gap = false;
            for x in (self.center.x + 2)..=east_limit {
                let empty = !view.is_occupied(Cell::new(x, y));
                if empty && !in_gap {
                    segments += 1;
                    if segments > 1 {
                        return false;
                    }
                }
                in_gap = empty;
            }
        }
        true
    }

    /// Plans the clean scripts: slide the center into the shortest
    /// west-strip row, shifting that row one cell west to make room.
    ///
    /// `west_limit` is the westmost column the sweep may use.
    #[must_use]
    pub fn clean(&self, view: &PlanView, west_limit: i32) -> CleanOutcome {
        let c = self.center;
        if !view.is_occupied(c) {
            return CleanOutcome::AlreadyClean;
        }
        let strip_start = c.x - 2;
        if strip_start < west_limit {
            return CleanOutcome::Done;
        }
        let capacity = (strip_start - west_limit + 1) as u32;
        let l_top = west_run(view, c.y + 1, strip_start, west_limit);
        let l_mid = west_run(view, c.y, strip_start, west_limit);
        let l_bot = west_run(view, c.y - 1, strip_start, west_limit);
        if l_top >= capacity && l_mid >= capacity && l_bot >= capacity {
            return CleanOutcome::Done;
        }

        let (variant, dy, center_exit) = if l_mid <= l_top && l_mid <= l_bot {
            (CleanVariant::Middle, 0, Move::West)
        } else if l_top < l_mid && l_top <= l_bot {
            (CleanVariant::Top, 1, Move::NorthWest)
        } else {
            (CleanVariant::Bottom, -1, Move::SouthWest)
        };

        // Sub-step 1: shift the chosen strip row plus the window's west cell
        // one west. On a top/middle tie the westmost strip module rotates
        // north-west instead, evening the rows out.
        let run_len = match variant {
            CleanVariant::Top => l_top,
            CleanVariant::Middle => l_mid,
            CleanVariant::Bottom => l_bot,
        };
        let y = c.y + dy;
        let mut shift = MoveSet::new();
        for i in 0..run_len {
            let cell = Cell::new(strip_start - i as i32, y);
            if let Some(id) = view.module_at(cell) {
                let rotate_up = variant == CleanVariant::Middle && l_top == l_mid && i + 1 == run_len;
                shift.insert(id, if rotate_up { Move::NorthWest } else { Move::West });
            }
        }
        if let Some(id) = view.module_at(Cell::new(c.x - 1, y)) {
            shift.insert(id, Move::West);
        }

        // Sub-step 2: the center follows into the vacated window cell.
        let mut exit = MoveSet::new();
        if let Some(id) = view.module_at(c) {
            exit.insert(id, center_exit);
        }

        let scripts = [shift, exit]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        CleanOutcome::Scripts(variant, scripts)
    }

    /// Plans the advance scripts: shift the window one column west.
    ///
    /// The case table is keyed by which of the western neighbor cells
    /// W1 = `(cx-2, cy+1)`, W2 = `(cx-2, cy)`, W3 = `(cx-2, cy-1)` are
    /// already occupied; occupied rows stay put and their east cells are
    /// left behind for the gather pass. With W2 free the hole travels west
    /// through the middle row on cardinal slides; with W2 occupied the
    /// window's west cell cuts the free corner diagonally (north-west for
    /// leading, mirrored south-west for trailing) and the facing row stays
    /// put, falling back to an eastward hop only when both corners are
    /// taken. Returns `None` unless the window is clean.
    #[must_use]
    pub fn advance(&self, view: &PlanView, role: Role) -> Option<Vec<MoveSet>> {
        if !self.is_clean(view) {
            return None;
        }
        let c = self.center;
        let w1 = view.is_occupied(c.offset(-2, 1));
        let w2 = view.is_occupied(c.offset(-2, 0));
        let w3 = view.is_occupied(c.offset(-2, -1));

        let mut mid_in = MoveSet::new();
        if let Some(id) = view.module_at(c.offset(1, 0)) {
            mid_in.insert(id, Move::West);
        }

        if w2 {
            // The hole must end on the new center, so the west cell leaves.
            // A free corner takes it diagonally and fills that row's west
            // slot in the same slide; boxed in on both rows it hops back
            // east and the east cell stays behind as a leftover.
            let corner = match (w1, w3, role) {
                (false, _, Role::Leading) | (false, true, Role::Trailing) => {
                    Some((Move::NorthWest, -1, !w3))
                }
                (_, false, Role::Trailing) | (true, false, Role::Leading) => {
                    Some((Move::SouthWest, 1, !w1))
                }
                _ => None,
            };
            let scripts = if let Some((diagonal, other_dy, other_free)) = corner {
                let mut hop = MoveSet::new();
                if let Some(id) = view.module_at(c.offset(-1, 0)) {
                    hop.insert(id, diagonal);
                }
                let other = other_free
                    .then(|| self.row_shift(view, other_dy))
                    .unwrap_or_default();
                vec![mid_in, hop, other]
            } else {
                let mut hop = MoveSet::new();
                if let Some(id) = view.module_at(c.offset(-1, 0)) {
                    hop.insert(id, Move::East);
                }
                vec![hop]
            };
            return Some(scripts.into_iter().filter(|s| !s.is_empty()).collect());
        }

        // W2 free: the hole travels west through the middle row.
        let top = (!w1).then(|| self.row_shift(view, 1)).unwrap_or_default();
        let bottom = (!w3).then(|| self.row_shift(view, -1)).unwrap_or_default();
        let mut mid_out = MoveSet::new();
        if let Some(id) = view.module_at(c.offset(-1, 0)) {
            mid_out.insert(id, Move::West);
        }

        // The middle pull goes first: it only touches the center column, and
        // running it before the row shifts keeps the west neighbors attached
        // to the ring throughout. Trailing metamodules mirror the row order.
        let ordered = match role {
            Role::Leading => [mid_in, top, bottom, mid_out],
            Role::Trailing => [mid_in, bottom, top, mid_out],
        };
        Some(ordered.into_iter().filter(|s| !s.is_empty()).collect())
    }

    /// One row of the window shifted a cell west, east cell included.
    fn row_shift(&self, view: &PlanView, dy: i32) -> MoveSet {
        let mut step = MoveSet::new();
        for dx in -1..=1 {
            if let Some(id) = view.module_at(self.center.offset(dx, dy)) {
                step.insert(id, Move::West);
            }
        }
        step
    }

    /// Pulls one trailing module from `(cx+2, cy+offset)` onto the window's
    /// east face. The face cell must be empty (the window is mid-rebuild)
    /// and the trailing cell occupied; the pull refills the window from the
    /// strip and so advances the region the sweep is responsible for.
    #[must_use]
    pub fn gather_east_strip(&self, view: &PlanView, offset: i32) -> Option<MoveSet> {
        let source = self.center.offset(2, offset);
        let face = self.center.offset(1, offset);
        if view.is_occupied(face) {
            return None;
        }
        let id = view.module_at(source)?;
        let mut step = MoveSet::new();
        step.insert(id, Move::West);
        Some(step)
    }
}

/// Length of the contiguous occupied run west from `start_x` (inclusive)
/// down to `west_limit`.
fn west_run(view: &PlanView, y: i32, start_x: i32, west_limit: i32) -> u32 {
    let mut len = 0;
    let mut x = start_x;
    while x >= west_limit && view.is_occupied(Cell::new(x, y)) {
        len += 1;
        x -= 1;
    }
    len
}
