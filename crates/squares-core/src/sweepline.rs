// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The sweep line: vertically stacked metamodules advancing west together.
//!
//! A sweep line is the ordered list of metamodules sharing one x column,
//! spaced three rows apart. Per tick it runs two passes: leading
//! metamodules (alternating, topmost first) plan their scripts and the
//! resulting sub-steps are flushed, then the trailing metamodules do the
//! same. Sub-steps of metamodules in the same pass touch disjoint rows, so
//! they merge slot-wise into shared move sets.

use crate::cell::Bounds;
use crate::cell::Cell;
use crate::environment::PlanView;
use crate::metamodule::{CleanOutcome, MetaModule, Role};
use crate::motion::MoveSet;

/// An ordered stack of metamodules on one sweep column.
#[derive(Debug, Clone)]
pub struct SweepLine {
    /// Common x coordinate of every metamodule center.
    pub x: i32,
    /// Metamodules, topmost first.
    pub metamodules: Vec<MetaModule>,
}

impl SweepLine {
    /// Builds the sweep line at column `x` spanning `bounds`.
    ///
    /// Centers sit on rows with `(y - min_y) % 3 == 1`, topmost first.
    #[must_use]
    pub fn at(x: i32, bounds: Bounds) -> Self {
        let mut metamodules = Vec::new();
        for y in (bounds.min_y..=bounds.max_y).rev() {
            if (y - bounds.min_y).rem_euclid(3) == 1 {
                metamodules.push(MetaModule::new(Cell::new(x, y)));
            }
        }
        Self { x, metamodules }
    }

    /// The scheduling role of the metamodule at `index` (topmost leads).
    #[must_use]
    pub fn role(index: usize) -> Role {
        if index % 2 == 0 {
            Role::Leading
        } else {
            Role::Trailing
        }
    }

    /// Every metamodule valid (solid or clean).
    #[must_use]
    pub fn is_valid(&self, view: &PlanView) -> bool {
        self.metamodules.iter().all(|m| m.is_valid(view))
    }

    /// Every metamodule solid.
    #[must_use]
    pub fn is_solid(&self, view: &PlanView) -> bool {
        self.metamodules.iter().all(|m| m.is_solid(view))
    }

    /// Every metamodule clean.
    #[must_use]
    pub fn is_clean(&self, view: &PlanView) -> bool {
        self.metamodules.iter().all(|m| m.is_clean(view))
    }

    /// Every metamodule a separator up to `east_limit`.
    #[must_use]
    pub fn is_separator(&self, view: &PlanView, east_limit: i32) -> bool {
        self.metamodules
            .iter()
            .all(|m| m.is_separator(view, east_limit))
    }

    /// Plans a clean tick: leading pass, then trailing pass.
    ///
    /// `view` is a scratch copy rolled forward after each flushed sub-step
    /// so the trailing pass sees the leading pass's result. Returns the
    /// flushed sub-steps and whether every metamodule reported done or
    /// already clean.
    #[must_use]
    pub fn plan_clean(&self, view: &mut PlanView, west_limit: i32) -> (Vec<MoveSet>, bool) {
        let mut flushed = Vec::new();
        let mut settled = true;
        for pass in [Role::Leading, Role::Trailing] {
            let mut slots: Vec<MoveSet> = vec![MoveSet::new(), MoveSet::new()];
            for (i, mm) in self.metamodules.iter().enumerate() {
                if Self::role(i) != pass {
                    continue;
                }
                match mm.clean(view, west_limit) {
                    CleanOutcome::AlreadyClean | CleanOutcome::Done => {}
                    CleanOutcome::Scripts(_, scripts) => {
                        settled = false;
                        for (slot, step) in slots.iter_mut().zip(scripts) {
                            slot.extend_from(&step);
                        }
                    }
                }
            }
            for slot in slots.into_iter().filter(|s| !s.is_empty()) {
                view.apply_unchecked(&slot);
                flushed.push(slot);
            }
        }
        (flushed, settled)
    }

    /// Plans an advance tick: leading pass, then trailing pass.
    ///
    /// Only clean metamodules advance; the caller decides when the whole
    /// line is ready. Returns the flushed sub-steps.
    #[must_use]
    pub fn plan_advance(&self, view: &mut PlanView) -> Vec<MoveSet> {
        let mut flushed = Vec::new();
        for pass in [Role::Leading, Role::Trailing] {
            let mut slots: Vec<MoveSet> =
                vec![MoveSet::new(), MoveSet::new(), MoveSet::new(), MoveSet::new()];
            for (i, mm) in self.metamodules.iter().enumerate() {
                if Self::role(i) != pass {
                    continue;
                }
                if let Some(scripts) = mm.advance(view, pass) {
                    for (slot, step) in slots.iter_mut().zip(scripts) {
                        slot.extend_from(&step);
                    }
                }
            }
            for slot in slots.into_iter().filter(|s| !s.is_empty()) {
                view.apply_unchecked(&slot);
                flushed.push(slot);
            }
        }
        flushed
    }

    /// Plans one gather tick for the given row `offset` of every window.
    ///
    /// Pulls are disjoint across metamodules and merge into a single step.
    #[must_use]
    pub fn plan_gather(&self, view: &mut PlanView, offset: i32) -> Option<MoveSet> {
        let mut merged = MoveSet::new();
        for mm in &self.metamodules {
            if let Some(step) = mm.gather_east_strip(view, offset) {
                merged.extend_from(&step);
            }
        }
        if merged.is_empty() {
            None
        } else {
            view.apply_unchecked(&merged);
            Some(merged)
        }
    }

    /// The same stack shifted one column west.
    #[must_use]
    pub fn shifted_west(&self) -> Self {
        Self {
            x: self.x - 1,
            metamodules: self
                .metamodules
                .iter()
                .map(|m| MetaModule::new(m.center.offset(-1, 0)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn block(min: (i32, i32), max: (i32, i32)) -> Environment {
        let mut env = Environment::builder().empty();
        for y in (min.1..=max.1).rev() {
            for x in min.0..=max.0 {
                env.add_module(Cell::new(x, y)).unwrap();
            }
        }
        env
    }

    #[test]
    fn line_positions_follow_the_three_row_pitch() {
        let b = Bounds {
            min_x: 0,
            max_x: 5,
            min_y: 0,
            max_y: 5,
        };
        let line = SweepLine::at(4, b);
        let ys: Vec<i32> = line.metamodules.iter().map(|m| m.center.y).collect();
        assert_eq!(ys, vec![4, 1]);
        assert_eq!(SweepLine::role(0), Role::Leading);
        assert_eq!(SweepLine::role(1), Role::Trailing);
    }

    #[test]
    fn solid_line_cleans_to_a_clean_line() {
        // A solid window at (4,1) with one support module on the bottom
        // west row; the center exits through the middle row.
        let mut env = block((3, 0), (5, 2));
        env.add_module(Cell::new(2, 0)).unwrap();
        let b = env.bounds().unwrap();
        let line = SweepLine::at(4, b);
        assert!(line.is_solid(&env.plan_view()));

        let mut scratch = env.plan_view();
        let (steps, settled) = line.plan_clean(&mut scratch, 0);
        assert!(!settled);
        assert!(!steps.is_empty());
        for step in &steps {
            env.apply(step).unwrap();
        }
        assert!(line.is_clean(&env.plan_view()));
    }

    #[test]
    fn clean_line_advances_west() {
        // Clean ring at (4,1) with its west rows free.
        let mut env = Environment::builder().empty();
        for y in 0..=2 {
            for x in 3..=5 {
                if (x, y) != (4, 1) {
                    env.add_module(Cell::new(x, y)).unwrap();
                }
            }
        }
        let b = Bounds {
            min_x: 0,
            max_x: 5,
            min_y: 0,
            max_y: 2,
        };
        let line = SweepLine::at(4, b);
        assert!(line.is_clean(&env.plan_view()));

        let mut scratch = env.plan_view();
        let steps = line.plan_advance(&mut scratch);
        assert!(!steps.is_empty());
        for step in &steps {
            env.apply(step).unwrap();
        }
        assert!(line.shifted_west().is_clean(&env.plan_view()));
    }
}
