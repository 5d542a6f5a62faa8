// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic maximal-subset selection over proposed moves.
//!
//! Phases propose greedy move sets that are usually over-eager; the selector
//! reduces them to a subset the executor will accept. Selection is fully
//! deterministic: candidates are taken by fewest live conflicts with ties
//! broken on ascending module id, and every tentative acceptance re-checks
//! cumulative connectivity of the would-be configuration.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::Cell;
use crate::collision::{self, CollisionKind, PlannedMove};
use crate::connectivity;
use crate::environment::PlanView;
use crate::motion::{ModuleId, MoveSet};

/// Selects a maximal admissible subset of `proposals`.
///
/// The returned set is collision-free, lands only on cells that are empty or
/// vacated by another selected mover, and keeps both the moved configuration
/// and the backbone connected. When no multi-move subset survives, a single
/// connectivity-safe move is returned (ascending id scan); failing that, the
/// empty set.
#[must_use]
pub fn select_safe_moves(view: &PlanView, proposals: &MoveSet) -> MoveSet {
    let positions = view.positions();
    let mut planned: Vec<PlannedMove> = Vec::with_capacity(proposals.len());
    for (id, mv) in proposals.moving() {
        if let Some(src) = positions.get(&id) {
            planned.push(PlannedMove::resolve(id, *src, mv));
        }
    }
    if planned.is_empty() {
        return MoveSet::new();
    }

    let occupied = view.occupied_cells();
    let by_id: FxHashMap<ModuleId, PlannedMove> =
        planned.iter().map(|m| (m.id, *m)).collect();

    // Pairwise conflict graph: same target, swap, slide interference.
    // Cycles are not edges; they are broken after selection if they form.
    let mut conflicts: FxHashMap<ModuleId, BTreeSet<ModuleId>> = planned
        .iter()
        .map(|m| (m.id, BTreeSet::new()))
        .collect();
    for record in collision::detect(&planned) {
        if record.kind == CollisionKind::Cycle {
            continue;
        }
        if let [a, b] = record.modules[..] {
            if let Some(set) = conflicts.get_mut(&a) {
                let _ = set.insert(b);
            }
            if let Some(set) = conflicts.get_mut(&b) {
                let _ = set.insert(a);
            }
        }
    }

    let mut remaining: BTreeSet<ModuleId> = planned.iter().map(|m| m.id).collect();
    let mut selected: BTreeSet<ModuleId> = BTreeSet::new();

    while !remaining.is_empty() {
        let candidate = pick_candidate(&remaining, &conflicts);
        let mut trial = selected.clone();
        let _ = trial.insert(candidate);
        if cumulative_connected(&occupied, &trial, &by_id) {
            let _ = selected.insert(candidate);
            let _ = remaining.remove(&candidate);
            if let Some(partners) = conflicts.get(&candidate) {
                for p in partners {
                    let _ = remaining.remove(p);
                }
            }
        } else {
            let _ = remaining.remove(&candidate);
        }
    }

    let selected = prune_to_executable(&occupied, selected, &by_id);

    if !selected.is_empty() && admissible(&occupied, &selected, &by_id) {
        return selected
            .iter()
            .filter_map(|id| proposals.get(*id).map(|mv| (*id, mv)))
            .collect();
    }

    // Fallback: first single move (ascending id) that is individually safe.
    for m in &planned {
        if connectivity::can_move_cell(&occupied, m.src, m.dst) {
            if let Some(mv) = proposals.get(m.id) {
                let mut single = MoveSet::new();
                single.insert(m.id, mv);
                return single;
            }
        }
    }
    MoveSet::new()
}

/// Candidate with the fewest conflicts still alive, ties on ascending id.
fn pick_candidate(
    remaining: &BTreeSet<ModuleId>,
    conflicts: &FxHashMap<ModuleId, BTreeSet<ModuleId>>,
) -> ModuleId {
    let mut best = None;
    for &id in remaining {
        let live = conflicts
            .get(&id)
            .map_or(0, |set| set.iter().filter(|p| remaining.contains(p)).count());
        match best {
            Some((count, _)) if count <= live => {}
            _ => best = Some((live, id)),
        }
    }
    // `remaining` is non-empty at every call site.
    best.map_or(ModuleId::from_raw(0), |(_, id)| id)
}

/// Set-semantics connectivity of "occupied, minus trial sources, plus trial
/// targets".
fn cumulative_connected(
    occupied: &FxHashSet<Cell>,
    trial: &BTreeSet<ModuleId>,
    by_id: &FxHashMap<ModuleId, PlannedMove>,
) -> bool {
    let mut after = occupied.clone();
    for id in trial {
        if let Some(m) = by_id.get(id) {
            let _ = after.remove(&m.src);
        }
    }
    for id in trial {
        if let Some(m) = by_id.get(id) {
            let _ = after.insert(m.dst);
        }
    }
    connectivity::is_connected(&after)
}

/// Drops every selected move whose target stays occupied by a non-mover,
/// iterating to a fixed point. The survivors can actually execute as one
/// simultaneous chain.
fn prune_to_executable(
    occupied: &FxHashSet<Cell>,
    mut selected: BTreeSet<ModuleId>,
    by_id: &FxHashMap<ModuleId, PlannedMove>,
) -> BTreeSet<ModuleId> {
    loop {
        let sources: FxHashSet<Cell> = selected
            .iter()
            .filter_map(|id| by_id.get(id).map(|m| m.src))
            .collect();
        let blocked: Vec<ModuleId> = selected
            .iter()
            .filter(|id| {
                by_id.get(id).is_some_and(|m| {
                    occupied.contains(&m.dst) && !sources.contains(&m.dst)
                })
            })
            .copied()
            .collect();
        if blocked.is_empty() {
            break;
        }
        for id in blocked {
            let _ = selected.remove(&id);
        }
    }

    // Break any source→target cycle that slipped through the conflict graph
    // by evicting its highest id, then re-prune the broken chain.
    loop {
        let moves: Vec<PlannedMove> = selected
            .iter()
            .filter_map(|id| by_id.get(id).copied())
            .collect();
        let cycle = collision::detect(&moves)
            .into_iter()
            .find(|c| c.kind == CollisionKind::Cycle || c.kind == CollisionKind::Swap);
        let Some(cycle) = cycle else {
            break;
        };
        if let Some(&evict) = cycle.modules.iter().max() {
            let _ = selected.remove(&evict);
        } else {
            break;
        }
        selected = prune_chain_only(occupied, selected, by_id);
    }
    selected
}

fn prune_chain_only(
    occupied: &FxHashSet<Cell>,
    mut selected: BTreeSet<ModuleId>,
    by_id: &FxHashMap<ModuleId, PlannedMove>,
) -> BTreeSet<ModuleId> {
    loop {
        let sources: FxHashSet<Cell> = selected
            .iter()
            .filter_map(|id| by_id.get(id).map(|m| m.src))
            .collect();
        let blocked: Vec<ModuleId> = selected
            .iter()
            .filter(|id| {
                by_id.get(id).is_some_and(|m| {
                    occupied.contains(&m.dst) && !sources.contains(&m.dst)
                })
            })
            .copied()
            .collect();
        if blocked.is_empty() {
            return selected;
        }
        for id in blocked {
            let _ = selected.remove(&id);
        }
    }
}

/// Final admissibility of the pruned subset: full cardinality after the
/// step, whole-ensemble connectivity, and backbone connectivity.
fn admissible(
    occupied: &FxHashSet<Cell>,
    selected: &BTreeSet<ModuleId>,
    by_id: &FxHashMap<ModuleId, PlannedMove>,
) -> bool {
    let mut after = occupied.clone();
    let mut moving: FxHashSet<Cell> = FxHashSet::default();
    for id in selected {
        if let Some(m) = by_id.get(id) {
            let _ = after.remove(&m.src);
            let _ = moving.insert(m.src);
        }
    }
    for id in selected {
        if let Some(m) = by_id.get(id) {
            let _ = after.insert(m.dst);
        }
    }
    after.len() == occupied.len()
        && connectivity::is_connected(&after)
        && connectivity::backbone_connected(occupied, &moving)
}
