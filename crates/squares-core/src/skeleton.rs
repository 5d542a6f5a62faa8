// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Phase 1: the exoskeleton target shape.
//!
//! The exoskeleton is the BFS skeleton of the current shape plus its
//! one-cell outer shell, with the structure's center cell left as the
//! protected hole. The raw union rarely has exactly `n` cells, so it is
//! trimmed or extended by proximity to the center of mass, and reconnected
//! with Manhattan bridges when trimming tears it apart.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::cell::{Bounds, Cell};
use crate::connectivity;
use crate::environment::PlanView;
use crate::targets::TargetSet;

/// Computes the Phase 1 target set for the configuration in `view`.
///
/// The result has exactly `view.len()` cells whenever the repair pipeline
/// can manage it, never covers the protected hole, and is connected for
/// every shape the planner feeds it.
#[must_use]
pub fn compute_exoskeleton(view: &PlanView) -> TargetSet {
    let occupied = view.occupied_cells();
    let Some(bounds) = view.bounds() else {
        return TargetSet::new();
    };
    let n = occupied.len();

    let skeleton = bfs_skeleton(&occupied);
    let shell = outer_shell(&skeleton);

    let mut exo: FxHashSet<Cell> = skeleton.union(&shell).copied().collect();
    let center = Bounds::of(exo.iter().copied()).map_or_else(|| bounds.center(), |b| b.center());
    let _ = exo.remove(&center);

    let com = center_of_mass(&occupied);

    let mut targets = TargetSet::with_hole(center);
    if exo.len() > n {
        let keep = closest_cells(&exo, com, n);
        targets.extend(keep);
    } else {
        targets.extend(exo.iter().copied());
        if targets.len() < n {
            let candidates = ring_candidates(bounds, &exo, center);
            grow_to_count(&mut targets, &candidates, com, n);
        }
    }

    if !targets.is_connected() {
        reconnect(&mut targets, &skeleton, com, n);
    }
    targets
}

/// BFS over the occupied set from its smallest cell; the reachable set is
/// the skeleton. For a connected configuration this covers every module.
fn bfs_skeleton(occupied: &FxHashSet<Cell>) -> FxHashSet<Cell> {
    let Some(root) = occupied.iter().min() else {
        return FxHashSet::default();
    };
    let mut visited: FxHashSet<Cell> = FxHashSet::default();
    let _ = visited.insert(*root);
    let mut queue = VecDeque::from([*root]);
    while let Some(current) = queue.pop_front() {
        for next in current.neighbors4() {
            if occupied.contains(&next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// The one-cell outer shell: every empty 4-neighbor of the skeleton.
fn outer_shell(skeleton: &FxHashSet<Cell>) -> FxHashSet<Cell> {
    let mut shell = FxHashSet::default();
    for cell in skeleton {
        for n in cell.neighbors4() {
            if !skeleton.contains(&n) {
                let _ = shell.insert(n);
            }
        }
    }
    shell
}

/// Center of mass of a non-empty cell set.
fn center_of_mass(cells: &FxHashSet<Cell>) -> (f64, f64) {
    let n = cells.len() as f64;
    let (sx, sy) = cells
        .iter()
        .fold((0.0, 0.0), |(ax, ay), c| (ax + f64::from(c.x), ay + f64::from(c.y)));
    (sx / n, sy / n)
}

fn com_distance(cell: Cell, com: (f64, f64)) -> f64 {
    (f64::from(cell.x) - com.0).abs() + (f64::from(cell.y) - com.1).abs()
}

/// The `count` cells of `cells` closest to `com`, ties on `(x, y)`.
fn closest_cells(cells: &FxHashSet<Cell>, com: (f64, f64), count: usize) -> Vec<Cell> {
    let mut sorted: Vec<Cell> = cells.iter().copied().collect();
    sorted.sort_unstable_by(|a, b| {
        com_distance(*a, com)
            .total_cmp(&com_distance(*b, com))
            .then_with(|| a.cmp(b))
    });
    sorted.truncate(count);
    sorted
}

/// Candidate cells in the grown bounding box, excluding the exoskeleton and
/// the hole.
fn ring_candidates(bounds: Bounds, exclude: &FxHashSet<Cell>, hole: Cell) -> Vec<Cell> {
    let grown = bounds.grown(1);
    let mut out = Vec::new();
    for x in grown.min_x..=grown.max_x {
        for y in grown.min_y..=grown.max_y {
            let c = Cell::new(x, y);
            if c != hole && !exclude.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

/// Adds candidates closest to `com` first until `targets` reaches `count`.
fn grow_to_count(targets: &mut TargetSet, candidates: &[Cell], com: (f64, f64), count: usize) {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| {
        com_distance(*a, com)
            .total_cmp(&com_distance(*b, com))
            .then_with(|| a.cmp(b))
    });
    for c in sorted {
        if targets.len() >= count {
            break;
        }
        let _ = targets.insert(c);
    }
}

/// Reconnects a torn target set with Manhattan bridges and restores the
/// exact count, preferring to keep skeleton cells.
fn reconnect(targets: &mut TargetSet, skeleton: &FxHashSet<Cell>, com: (f64, f64), count: usize) {
    let hole = targets.hole();
    let cells = targets.to_hash_set();
    let components = connectivity::connected_components(&cells);
    if components.is_empty() {
        return;
    }

    let mut ordered = components;
    ordered.sort_by_key(|c| core::cmp::Reverse(c.len()));
    let mut merged: FxHashSet<Cell> = ordered[0].iter().copied().collect();
    for other in &ordered[1..] {
        let other_set: FxHashSet<Cell> = other.iter().copied().collect();
        if let Some((a, b)) = closest_pair(&merged, &other_set) {
            for p in bridge_between(a, b, hole) {
                if Some(p) != hole {
                    let _ = merged.insert(p);
                }
            }
        }
        merged.extend(other.iter().copied());
    }

    if merged.len() > count {
        // Trim farthest-from-mass non-skeleton cells first, skeleton last.
        let mut sorted: Vec<Cell> = merged.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| {
            let rank =
                |c: &Cell| (usize::from(!skeleton.contains(c)), com_distance(*c, com));
            let (ra, da) = rank(a);
            let (rb, db) = rank(b);
            rb.cmp(&ra)
                .then_with(|| db.total_cmp(&da))
                .then_with(|| a.cmp(b))
        });
        for cell in sorted {
            if merged.len() <= count {
                break;
            }
            let mut test = merged.clone();
            let _ = test.remove(&cell);
            if connectivity::is_connected(&test) {
                merged = test;
            }
        }
    }

    let mut rebuilt = hole.map_or_else(TargetSet::new, TargetSet::with_hole);
    rebuilt.extend(merged.into_iter());
    *targets = rebuilt;
}

/// The closest pair of cells between two components, deterministically.
pub(crate) fn closest_pair(a: &FxHashSet<Cell>, b: &FxHashSet<Cell>) -> Option<(Cell, Cell)> {
    let mut best: Option<(u32, Cell, Cell)> = None;
    let mut av: Vec<Cell> = a.iter().copied().collect();
    let mut bv: Vec<Cell> = b.iter().copied().collect();
    av.sort_unstable();
    bv.sort_unstable();
    for &ca in &av {
        for &cb in &bv {
            let d = ca.manhattan(cb);
            match best {
                Some((bd, _, _)) if bd <= d => {}
                _ => best = Some((d, ca, cb)),
            }
        }
    }
    best.map(|(_, ca, cb)| (ca, cb))
}

/// An L-shaped Manhattan path: horizontal at `a.y`, then vertical at `b.x`.
fn manhattan_path(a: Cell, b: Cell) -> Vec<Cell> {
    let mut path = Vec::new();
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    for x in x0..=x1 {
        path.push(Cell::new(x, a.y));
    }
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
    for y in y0..=y1 {
        path.push(Cell::new(b.x, y));
    }
    path
}

/// The mirrored L: vertical at `a.x`, then horizontal at `b.y`.
fn manhattan_path_vertical_first(a: Cell, b: Cell) -> Vec<Cell> {
    let mut path = Vec::new();
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
    for y in y0..=y1 {
        path.push(Cell::new(a.x, y));
    }
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    for x in x0..=x1 {
        path.push(Cell::new(x, b.y));
    }
    path
}

/// A Manhattan bridge from `a` to `b` that never crosses `hole`.
///
/// Tries both L orientations first; when the endpoints are collinear with
/// the hole between them, hops one lane around it.
pub(crate) fn bridge_between(a: Cell, b: Cell, hole: Option<Cell>) -> Vec<Cell> {
    let first = manhattan_path(a, b);
    let Some(h) = hole else {
        return first;
    };
    if !first.contains(&h) {
        return first;
    }
    let second = manhattan_path_vertical_first(a, b);
    if !second.contains(&h) {
        return second;
    }
    // Both Ls hit the hole, so a, b, and the hole are collinear.
    let mut path = Vec::new();
    if a.y == b.y {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            if x != h.x {
                path.push(Cell::new(x, a.y));
            }
        }
        for x in (h.x - 1)..=(h.x + 1) {
            path.push(Cell::new(x, a.y + 1));
        }
    } else {
        for y in a.y.min(b.y)..=a.y.max(b.y) {
            if y != h.y {
                path.push(Cell::new(a.x, y));
            }
        }
        for y in (h.y - 1)..=(h.y + 1) {
            path.push(Cell::new(a.x + 1, y));
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn exoskeleton_count_matches_module_count() {
        let env = Environment::from_grid("111\n111\n111").unwrap();
        let t = compute_exoskeleton(&env.plan_view());
        assert_eq!(t.len(), 9);
    }

    #[test]
    fn exoskeleton_never_covers_the_hole() {
        let env = Environment::from_grid("111\n111\n111").unwrap();
        let t = compute_exoskeleton(&env.plan_view());
        let hole = t.hole().unwrap();
        assert!(!t.contains(hole));
    }

    #[test]
    fn exoskeleton_is_connected_for_a_bar() {
        let env = Environment::from_grid("11111").unwrap();
        let t = compute_exoskeleton(&env.plan_view());
        assert_eq!(t.len(), 5);
        assert!(t.is_connected());
    }

    #[test]
    fn empty_view_yields_empty_targets() {
        let env = Environment::from_grid("").unwrap();
        assert!(compute_exoskeleton(&env.plan_view()).is_empty());
    }

    #[test]
    fn manhattan_path_connects_endpoints() {
        let path = manhattan_path(Cell::new(0, 0), Cell::new(3, 2));
        assert!(path.contains(&Cell::new(0, 0)));
        assert!(path.contains(&Cell::new(3, 2)));
        assert!(path.contains(&Cell::new(3, 0)));
    }
}
