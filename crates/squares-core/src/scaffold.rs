// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Phase 2: the canonical sweep-line scaffolding.
//!
//! The scaffolding is a three-column band on the east side of the extended
//! bounding box (height rounded up to a multiple of 3): the rightmost
//! column full, the middle column dotted (empty where `(y - min_y) % 3 == 1`,
//! the separator gaps), and the column west of the middle full. Surplus
//! modules extend the band with full columns westward; missing modules trim
//! it from the west. The geometric center of the finished scaffold stays
//! empty as the workspace hole.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::cell::{Bounds, Cell};
use crate::connectivity;
use crate::environment::PlanView;
use crate::skeleton::{bridge_between, closest_pair};
use crate::targets::TargetSet;

/// The three-column east band over `bounds` (already extended).
///
/// Gap cells of the dotted middle column are *not* included; they are the
/// separator gaps Phase 3 relies on.
#[must_use]
pub fn sweep_band(bounds: Bounds) -> BTreeSet<Cell> {
    let mut band = BTreeSet::new();
    for y in bounds.min_y..=bounds.max_y {
        let _ = band.insert(Cell::new(bounds.max_x, y));
        if (y - bounds.min_y).rem_euclid(3) != 1 {
            let _ = band.insert(Cell::new(bounds.max_x - 1, y));
        }
        let _ = band.insert(Cell::new(bounds.max_x - 2, y));
    }
    band
}

/// The dotted middle column's gap cells for `bounds`.
#[must_use]
pub fn separator_gaps(bounds: Bounds) -> BTreeSet<Cell> {
    (bounds.min_y..=bounds.max_y)
        .filter(|y| (y - bounds.min_y).rem_euclid(3) == 1)
        .map(|y| Cell::new(bounds.max_x - 1, y))
        .collect()
}

/// Computes the Phase 2 target set for the configuration in `view`.
#[must_use]
pub fn compute_scaffolding(view: &PlanView) -> TargetSet {
    let occupied = view.occupied_cells();
    let Some(bounds) = view.bounds() else {
        return TargetSet::new();
    };
    let ext = bounds.extended_to_height_multiple(3);
    let n = occupied.len();
    let com = center_of_mass(&occupied);
    let band = sweep_band(ext);
    let gaps = separator_gaps(ext);

    let mut scaff: BTreeSet<Cell> = band.clone();
    extend_with_columns(&mut scaff, ext, n);
    trim_preserving_band(&mut scaff, &band, com, n);

    // Workspace hole at the scaffold's own center.
    let hole = Bounds::of(scaff.iter().copied()).map(|b| b.center());
    let mut targets = hole.map_or_else(TargetSet::new, TargetSet::with_hole);
    targets.extend(scaff.iter().copied());

    if targets.len() < n {
        top_up(&mut targets, &gaps, com, n);
    }
    if targets.len() > n {
        trim_while_connected(&mut targets, com, n);
    }
    if !targets.is_connected() {
        repair(&mut targets, &gaps, com, n);
    }
    targets
}

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

/// Adds full columns adjacent to the band, west first, until `n` cells.
fn extend_with_columns(scaff: &mut BTreeSet<Cell>, ext: Bounds, n: usize) {
    if scaff.len() >= n {
        return;
    }
    let mut x = scaff.iter().map(|c| c.x).min().unwrap_or(ext.max_x) - 1;
    while scaff.len() < n && x >= ext.min_x - 5 {
        for y in ext.min_y..=ext.max_y {
            if scaff.len() >= n {
                break;
            }
            let _ = scaff.insert(Cell::new(x, y));
        }
        x -= 1;
    }
    // Still short: grow eastward beyond the band.
    let mut x = scaff.iter().map(|c| c.x).max().unwrap_or(ext.max_x) + 1;
    while scaff.len() < n {
        for y in ext.min_y..=ext.max_y {
            if scaff.len() >= n {
                break;
            }
            let _ = scaff.insert(Cell::new(x, y));
        }
        x += 1;
    }
}

/// Trims surplus cells, taking non-band cells farthest from the center of
/// mass first and only ever removing cells whose loss keeps the set
/// connected.
fn trim_preserving_band(scaff: &mut BTreeSet<Cell>, band: &BTreeSet<Cell>, com: (f64, f64), n: usize) {
    if scaff.len() <= n {
        return;
    }
    let mut order: Vec<Cell> = scaff.iter().copied().collect();
    order.sort_unstable_by(|a, b| {
        let rank = |c: &Cell| (usize::from(band.contains(c)), com_distance(*c, com));
        let (ba, da) = rank(a);
        let (bb, db) = rank(b);
        ba.cmp(&bb)
            .then_with(|| db.total_cmp(&da))
            .then_with(|| a.cmp(b))
    });
    for cell in order {
        if scaff.len() <= n {
            break;
        }
        let mut test: FxHashSet<Cell> = scaff.iter().copied().collect();
        let _ = test.remove(&cell);
        if connectivity::is_connected(&test) {
            let _ = scaff.remove(&cell);
        }
    }
}

/// Adds ring candidates around the scaffold until `n`, never touching the
/// separator gaps or the hole.
fn top_up(targets: &mut TargetSet, gaps: &BTreeSet<Cell>, com: (f64, f64), n: usize) {
    let Some(b) = Bounds::of(targets.iter()) else {
        return;
    };
    let grown = b.grown(1);
    let mut candidates: Vec<Cell> = Vec::new();
    for x in grown.min_x..=grown.max_x {
        for y in grown.min_y..=grown.max_y {
            let c = Cell::new(x, y);
            if !targets.contains(c) && !gaps.contains(&c) {
                candidates.push(c);
            }
        }
    }
    candidates.sort_unstable_by(|a, b| {
        com_distance(*a, com)
            .total_cmp(&com_distance(*b, com))
            .then_with(|| a.cmp(b))
    });
    for c in candidates {
        if targets.len() >= n {
            break;
        }
        // Keep the growing set connected; the first candidates touch it by
        // construction of the ring.
        let mut test = targets.to_hash_set();
        let _ = test.insert(c);
        if connectivity::is_connected(&test) {
            let _ = targets.insert(c);
        }
    }
}

/// Removes cells farthest from the center of mass while staying connected.
fn trim_while_connected(targets: &mut TargetSet, com: (f64, f64), n: usize) {
    let mut order: Vec<Cell> = targets.iter().collect();
    order.sort_unstable_by(|a, b| {
        com_distance(*b, com)
            .total_cmp(&com_distance(*a, com))
            .then_with(|| a.cmp(b))
    });
    for cell in order {
        if targets.len() <= n {
            break;
        }
        let mut test = targets.to_hash_set();
        let _ = test.remove(&cell);
        if connectivity::is_connected(&test) {
            let _ = targets.remove(cell);
        }
    }
}

/// Bridges disconnected pieces back together, then restores the count.
fn repair(targets: &mut TargetSet, gaps: &BTreeSet<Cell>, com: (f64, f64), n: usize) {
    let hole = targets.hole();
    let cells = targets.to_hash_set();
    let mut components = connectivity::connected_components(&cells);
    if components.is_empty() {
        return;
    }
    components.sort_by_key(|c| core::cmp::Reverse(c.len()));

    let mut merged: FxHashSet<Cell> = components[0].iter().copied().collect();
    for other in &components[1..] {
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

    let mut rebuilt = hole.map_or_else(TargetSet::new, TargetSet::with_hole);
    rebuilt.extend(merged.into_iter());
    if rebuilt.len() > n {
        trim_while_connected(&mut rebuilt, com, n);
    } else if rebuilt.len() < n {
        top_up(&mut rebuilt, gaps, com, n);
    }
    *targets = rebuilt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn band_shape_for_an_aligned_box() {
        let b = Bounds {
            min_x: 0,
            max_x: 3,
            min_y: 0,
            max_y: 2,
        };
        let band = sweep_band(b);
        // Right column full, middle dotted, west-of-middle full.
        assert_eq!(band.len(), 8);
        assert!(band.contains(&Cell::new(3, 1)));
        assert!(!band.contains(&Cell::new(2, 1)));
        assert!(band.contains(&Cell::new(1, 1)));
        assert_eq!(separator_gaps(b), [Cell::new(2, 1)].into_iter().collect());
    }

    #[test]
    fn twelve_module_block_gets_a_twelve_cell_scaffold() {
        let env = Environment::from_grid("1111\n1111\n1111").unwrap();
        let t = compute_scaffolding(&env.plan_view());
        assert_eq!(t.len(), 12);
        assert!(t.is_connected());
        // The hole is empty and the separator gaps stay open.
        let hole = t.hole().unwrap();
        assert!(!t.contains(hole));
        let ext = env.bounds().unwrap().extended_to_height_multiple(3);
        for gap in separator_gaps(ext) {
            assert!(!t.contains(gap), "separator gap {gap} was covered");
        }
    }

    #[test]
    fn band_columns_survive_in_the_scaffold() {
        let env = Environment::from_grid("1111\n1111\n1111").unwrap();
        let t = compute_scaffolding(&env.plan_view());
        let ext = env.bounds().unwrap().extended_to_height_multiple(3);
        let hole = t.hole().unwrap();
        for cell in sweep_band(ext) {
            if cell == hole {
                continue;
            }
            assert!(t.contains(cell), "band cell {cell} missing");
        }
    }

    #[test]
    fn height_is_extended_to_a_multiple_of_three() {
        // Four rows extend to six; the band spans the extended height.
        let env = Environment::from_grid("1111\n1111\n1111\n1111").unwrap();
        let t = compute_scaffolding(&env.plan_view());
        assert_eq!(t.len(), 16);
        let ext = env.bounds().unwrap().extended_to_height_multiple(3);
        assert_eq!(ext.height(), 6);
        assert!(t.iter().all(|c| c.y <= ext.max_y + 1));
    }
}
