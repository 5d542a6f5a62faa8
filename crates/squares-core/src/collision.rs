// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collision taxonomy for simultaneous move sets.
//!
//! A step is a set of unit slides executed at the same instant. Four kinds of
//! pairwise/cyclic conflicts make a step inadmissible:
//!
//! - **same target** — two modules end on the same cell;
//! - **swap** — two modules exchange cells, passing through each other;
//! - **cycle** — the source→target graph closes a loop of length ≥ 3
//!   (a block rotation; rejected unless the `rotations` feature is on);
//! - **slide interference** — a diagonal slide sweeps the corner region of a
//!   neighboring slide with a non-cooperating delta.
//!
//! Same-direction chains (a module moving into the cell its neighbor vacates
//! with a compatible delta) are admissible and detected by none of the above.
//! The check is purely combinatorial; no sub-step timing is simulated.

use rustc_hash::FxHashMap;

use crate::cell::Cell;
use crate::motion::{ModuleId, Move};

/// One entry of a resolved move set: a module, where it is, where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    /// The moving module.
    pub id: ModuleId,
    /// Its current cell.
    pub src: Cell,
    /// Its target cell.
    pub dst: Cell,
}

impl PlannedMove {
    /// The delta vector of this move.
    #[must_use]
    pub const fn delta(&self) -> (i32, i32) {
        (self.dst.x - self.src.x, self.dst.y - self.src.y)
    }

    /// Returns true when the move is along a corner delta.
    #[must_use]
    pub const fn is_diagonal(&self) -> bool {
        let (dx, dy) = self.delta();
        dx != 0 && dy != 0
    }

    /// Resolves a `(id, move)` pair against a source cell.
    #[must_use]
    pub fn resolve(id: ModuleId, src: Cell, mv: Move) -> Self {
        Self {
            id,
            src,
            dst: mv.applied_to(src),
        }
    }
}

/// The kind of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Distinct modules map to the same target cell.
    SameTarget,
    /// Two modules exchange cells.
    Swap,
    /// A source→target cycle of length ≥ 3.
    Cycle,
    /// Crossing or grazing slides that need the same corner clearance.
    SlideInterference,
}

/// One detected conflict: its kind and the modules involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// What went wrong.
    pub kind: CollisionKind,
    /// The modules involved, in ascending id order.
    pub modules: Vec<ModuleId>,
}

impl core::fmt::Display for Collision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match self.kind {
            CollisionKind::SameTarget => "same target",
            CollisionKind::Swap => "swap",
            CollisionKind::Cycle => "cycle",
            CollisionKind::SlideInterference => "slide interference",
        };
        write!(f, "{kind}:")?;
        for m in &self.modules {
            write!(f, " {m}")?;
        }
        Ok(())
    }
}

/// Returns true when the ordered pair of deltas cooperates: the dot product
/// is positive, i.e. the moves share a direction component.
const fn cooperating(a: (i32, i32), b: (i32, i32)) -> bool {
    a.0 * b.0 + a.1 * b.1 > 0
}

/// Returns true when `a` and `b` need the same corner clearance.
///
/// Cardinal-cardinal pairs never interfere: an axis-aligned slide stays
/// inside its own lane, so orthogonal follow-chains remain admissible. A
/// diagonal slide sweeps the corner between its source and target rows and
/// columns, which collides with any non-cooperating slide it grazes.
fn slide_interferes(a: &PlannedMove, b: &PlannedMove) -> bool {
    if !a.is_diagonal() && !b.is_diagonal() {
        return false;
    }
    if cooperating(a.delta(), b.delta()) {
        return false;
    }
    a.dst == b.src
        || b.dst == a.src
        || a.dst.is_adjacent4(b.src)
        || b.dst.is_adjacent4(a.src)
}

/// Detects all conflicts in `moves`.
///
/// `moves` must already exclude `Stay` entries; sources are assumed unique
/// (one module per cell). The result lists each conflict once, pairs in
/// ascending id order, deterministically for a deterministic input order.
#[must_use]
pub fn detect(moves: &[PlannedMove]) -> Vec<Collision> {
    let mut collisions = Vec::new();

    // Same target: first claimant wins the map slot, later ones collide.
    let mut claimed: FxHashMap<Cell, ModuleId> = FxHashMap::default();
    for m in moves {
        if let Some(first) = claimed.get(&m.dst) {
            collisions.push(Collision {
                kind: CollisionKind::SameTarget,
                modules: sorted_pair(*first, m.id),
            });
        } else {
            let _ = claimed.insert(m.dst, m.id);
        }
    }

    // Swap and cycle: walk the source -> target functional graph.
    collisions.extend(detect_cycles(moves));

    // Slide interference: pairwise corner-clearance test.
    for (i, a) in moves.iter().enumerate() {
        for b in &moves[i + 1..] {
            if a.dst == b.dst || (a.dst == b.src && b.dst == a.src) {
                // Already reported as same-target or swap.
                continue;
            }
            if slide_interferes(a, b) {
                collisions.push(Collision {
                    kind: CollisionKind::SlideInterference,
                    modules: sorted_pair(a.id, b.id),
                });
            }
        }
    }

    collisions
}

/// Returns true when `moves` has no conflicts.
#[must_use]
pub fn is_collision_free(moves: &[PlannedMove]) -> bool {
    detect(moves).is_empty()
}

fn sorted_pair(a: ModuleId, b: ModuleId) -> Vec<ModuleId> {
    let mut v = vec![a, b];
    v.sort_unstable();
    v
}

/// Finds cycles in the source→target graph restricted to moving modules.
///
/// Each source cell belongs to exactly one mover, so following
/// `dst == next.src` is a functional walk. A closed walk of length 2 is a
/// swap; longer closed walks are cycles (block rotations). With the
/// `rotations` feature, cycles of length ≥ 3 are admitted and only swaps
/// are reported.
fn detect_cycles(moves: &[PlannedMove]) -> Vec<Collision> {
    let by_src: FxHashMap<Cell, usize> = moves
        .iter()
        .enumerate()
        .map(|(i, m)| (m.src, i))
        .collect();

    let mut collisions = Vec::new();
    // 0 = unvisited, 1 = on current walk, 2 = finished.
    let mut state = vec![0u8; moves.len()];

    for start in 0..moves.len() {
        if state[start] != 0 {
            continue;
        }
        let mut walk = Vec::new();
        let mut current = start;
        loop {
            state[current] = 1;
            walk.push(current);
            let Some(&next) = by_src.get(&moves[current].dst) else {
                break;
            };
            match state[next] {
                0 => current = next,
                1 => {
                    // Closed a loop; the cycle is the walk suffix from `next`.
                    let pos = walk.iter().position(|&i| i == next).unwrap_or(0);
                    let mut ids: Vec<ModuleId> = walk[pos..].iter().map(|&i| moves[i].id).collect();
                    ids.sort_unstable();
                    let kind = if ids.len() == 2 {
                        Some(CollisionKind::Swap)
                    } else if cfg!(feature = "rotations") {
                        None
                    } else {
                        Some(CollisionKind::Cycle)
                    };
                    if let Some(kind) = kind {
                        collisions.push(Collision { kind, modules: ids });
                    }
                    break;
                }
                _ => break,
            }
        }
        for &i in &walk {
            state[i] = 2;
        }
    }

    collisions
}
