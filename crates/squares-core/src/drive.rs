// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The shared greedy drive loop: assign, propose, select.
//!
//! Phases 1, 2, and the direct path all move the ensemble toward a target
//! cell set the same way. Each round assigns every module to its nearest
//! remaining target (ascending id), proposes one cardinal step that shrinks
//! the Manhattan gap, and hands the proposals to the selector. One round
//! maps to one external tick; the drive itself never mutates anything.

use std::collections::BTreeSet;

use crate::cell::Cell;
use crate::environment::PlanView;
use crate::motion::{ModuleId, Move, MoveSet};
use crate::selector;

/// Outcome of one drive round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveRound {
    /// Apply this (possibly empty) move set and call again next tick.
    Step(MoveSet),
    /// The occupied set equals the target set.
    Reached,
    /// The loop stopped making progress or exhausted its round cap.
    Stalled,
}

/// Greedy driver state for one target set.
#[derive(Debug, Clone)]
pub struct Drive {
    targets: BTreeSet<Cell>,
    rounds: u64,
    max_rounds: u64,
    no_progress: u32,
    max_no_progress: u32,
}

/// Consecutive fruitless rounds tolerated before a stall is declared.
const MAX_NO_PROGRESS: u32 = 60;

impl Drive {
    /// Creates a driver toward `targets`, capped at `max_rounds` rounds.
    #[must_use]
    pub fn new(targets: BTreeSet<Cell>, max_rounds: u64) -> Self {
        Self {
            targets,
            rounds: 0,
            max_rounds,
            no_progress: 0,
            max_no_progress: MAX_NO_PROGRESS,
        }
    }

    /// The conventional round cap for `n` modules.
    #[must_use]
    pub const fn default_cap(n: usize) -> u64 {
        let n = n as u64;
        2 * n * n + 16
    }

    /// The target set this driver works toward.
    #[must_use]
    pub const fn targets(&self) -> &BTreeSet<Cell> {
        &self.targets
    }

    /// Plans one round against `view`.
    #[must_use]
    pub fn plan_round(&mut self, view: &PlanView) -> DriveRound {
        let occupied: BTreeSet<Cell> = view.occupied_cells().into_iter().collect();
        if occupied == self.targets {
            return DriveRound::Reached;
        }
        self.rounds += 1;
        if self.rounds > self.max_rounds {
            return DriveRound::Stalled;
        }

        let proposals = self.propose(view);
        if proposals.is_empty() {
            return self.fruitless();
        }

        let selected = selector::select_safe_moves(view, &proposals);
        if selected.is_empty() {
            return self.fruitless();
        }
        self.no_progress = 0;
        DriveRound::Step(selected)
    }

    fn fruitless(&mut self) -> DriveRound {
        self.no_progress += 1;
        if self.no_progress > self.max_no_progress {
            DriveRound::Stalled
        } else {
            DriveRound::Step(MoveSet::new())
        }
    }

    /// Greedy assignment plus one-step cardinal proposals.
    fn propose(&self, view: &PlanView) -> MoveSet {
        let assignments = assign_to_targets(view, &self.targets);
        let mut proposals = MoveSet::new();
        for (id, src, tgt) in assignments {
            let Some(mv) = cardinal_step_toward(src, tgt) else {
                continue;
            };
            let next = mv.applied_to(src);
            if next.manhattan(tgt) < src.manhattan(tgt) {
                proposals.insert(id, mv);
            }
        }
        proposals
    }
}

/// Assigns each module (ascending id) to its nearest unclaimed target.
///
/// Ties break on ascending `(x, y)` of the target, keeping the assignment
/// deterministic for any view.
#[must_use]
pub fn assign_to_targets(
    view: &PlanView,
    targets: &BTreeSet<Cell>,
) -> Vec<(ModuleId, Cell, Cell)> {
    let mut remaining: BTreeSet<Cell> = targets.clone();
    let mut out = Vec::new();
    for (id, src) in view.positions() {
        if remaining.is_empty() {
            break;
        }
        let mut best: Option<(u32, Cell)> = None;
        for &t in &remaining {
            let d = src.manhattan(t);
            match best {
                Some((bd, _)) if bd <= d => {}
                _ => best = Some((d, t)),
            }
        }
        if let Some((_, tgt)) = best {
            let _ = remaining.remove(&tgt);
            out.push((id, src, tgt));
        }
    }
    out
}

/// One cardinal step from `src` toward `tgt`, preferring the dominant axis
/// (east/west on ties). `None` when already there.
#[must_use]
pub const fn cardinal_step_toward(src: Cell, tgt: Cell) -> Option<Move> {
    let dx = tgt.x - src.x;
    let dy = tgt.y - src.y;
    if dx == 0 && dy == 0 {
        return None;
    }
    if dx.abs() >= dy.abs() {
        if dx > 0 {
            Some(Move::East)
        } else {
            Some(Move::West)
        }
    } else if dy > 0 {
        Some(Move::North)
    } else {
        Some(Move::South)
    }
}
