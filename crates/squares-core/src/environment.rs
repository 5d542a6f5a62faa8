// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Environment: the module table, the occupancy index, and the atomic step
//! executor.
//!
//! The environment is the single owner of mutable state. Every structural
//! device of the planner (metamodules, sweep lines, histograms, snakes)
//! holds ids or captured positions and re-resolves them here after each
//! mutation. Mutation happens only through [`Environment::apply`], which is
//! all-or-nothing: a rejected step leaves the environment untouched.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::cell::{Bounds, Cell};
use crate::collision::{self, Collision, PlannedMove};
use crate::connectivity;
use crate::grid::{self, GridError};
use crate::motion::{ModuleId, MoveSet};

/// What the executor does with a target cell outside the working window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// No window: every target is in bounds. The planner's default.
    #[default]
    Unbounded,
    /// Reject the whole step when any target leaves the window.
    Strict(Bounds),
    /// Treat out-of-window moves as `Stay`. Legacy behavior, offered to
    /// display shims only; the planner never uses it.
    Clamp(Bounds),
}

/// Errors returned by the step executor.
#[derive(Debug, Error)]
pub enum StepError {
    /// The move set names a module the environment does not know.
    #[error("unknown module {0}")]
    UnknownModule(ModuleId),
    /// A target cell violates the strict bounds window.
    #[error("module {module} target {target} is out of bounds")]
    OutOfBounds {
        /// The module whose target left the window.
        module: ModuleId,
        /// The offending target cell.
        target: Cell,
    },
    /// A module would land on a cell that stays occupied this step.
    #[error("target cell {cell} is occupied")]
    CellOccupied {
        /// The contested cell.
        cell: Cell,
    },
    /// The collision detector rejected the step.
    #[error("inadmissible step ({} collision(s))", .0.len())]
    Collision(Vec<Collision>),
    /// The step would disconnect the ensemble or its backbone.
    #[error("step would break connectivity")]
    ConnectivityBreak,
}

/// Fluent constructor for [`Environment`] instances.
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    policy: BoundsPolicy,
}

impl EnvironmentBuilder {
    /// Starts a builder with the default (unbounded) policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bounds policy of the environment under construction.
    #[must_use]
    pub fn bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Finishes with an empty environment.
    #[must_use]
    pub fn empty(self) -> Environment {
        Environment {
            modules: BTreeMap::new(),
            occupancy: FxHashMap::default(),
            policy: self.policy,
            next_id: 1,
        }
    }

    /// Finishes by decoding an ASCII grid.
    ///
    /// Ids are assigned in reading order (top row first, west to east),
    /// starting at 1. Fails with [`GridError::Disconnected`] when the
    /// occupied cells are not one component; the empty grid is accepted.
    pub fn from_grid(self, text: &str) -> Result<Environment, GridError> {
        let cells = grid::parse(text)?;
        if !connectivity::is_connected_iter(cells.iter().copied()) {
            return Err(GridError::Disconnected);
        }
        let mut env = self.empty();
        let mut ordered: Vec<Cell> = cells.into_iter().collect();
        ordered.sort_unstable_by_key(|c| (core::cmp::Reverse(c.y), c.x));
        for cell in ordered {
            // Cells come from a set; occupancy cannot clash.
            let _ = env.place_new(cell);
        }
        Ok(env)
    }
}

/// The module table plus the occupancy index, with the atomic executor.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Module id → position; iteration in ascending id drives determinism.
    modules: BTreeMap<ModuleId, Cell>,
    /// Cell → module id; the fast lookup side of the bijection.
    occupancy: FxHashMap<Cell, ModuleId>,
    policy: BoundsPolicy,
    next_id: u32,
}

impl Environment {
    /// Starts a fluent builder.
    #[must_use]
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Decodes an ASCII grid with the default policy.
    pub fn from_grid(text: &str) -> Result<Self, GridError> {
        EnvironmentBuilder::new().from_grid(text)
    }

    /// Creates a module at `cell`, allocating the next id.
    ///
    /// Ids are never reused; the allocator lives here, not in a global.
    pub fn add_module(&mut self, cell: Cell) -> Result<ModuleId, StepError> {
        if self.occupancy.contains_key(&cell) {
            return Err(StepError::CellOccupied { cell });
        }
        Ok(self.place_new(cell))
    }

    fn place_new(&mut self, cell: Cell) -> ModuleId {
        let id = ModuleId::from_raw(self.next_id);
        self.next_id += 1;
        let _ = self.modules.insert(id, cell);
        let _ = self.occupancy.insert(cell, id);
        id
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true when no module exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The bounds policy this environment was built with.
    #[must_use]
    pub const fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    /// The module occupying `cell`, if any.
    #[must_use]
    pub fn module_at(&self, cell: Cell) -> Option<ModuleId> {
        self.occupancy.get(&cell).copied()
    }

    /// The position of `id`, if it exists.
    #[must_use]
    pub fn position(&self, id: ModuleId) -> Option<Cell> {
        self.modules.get(&id).copied()
    }

    /// Iterates `(id, cell)` in ascending id order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, Cell)> + '_ {
        self.modules.iter().map(|(id, cell)| (*id, *cell))
    }

    /// The occupied cell set, ordered.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<Cell> {
        self.occupancy.keys().copied().collect()
    }

    /// Bounding box of the occupied set; `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(self.occupancy.keys().copied())
    }

    /// Renders the occupied set as a top-to-bottom 0/1 matrix over the
    /// bounding box. Empty environments render as an empty matrix.
    #[must_use]
    pub fn matrix(&self) -> Vec<Vec<u8>> {
        let Some(b) = self.bounds() else {
            return Vec::new();
        };
        let mut rows = Vec::with_capacity(b.height() as usize);
        for y in (b.min_y..=b.max_y).rev() {
            let mut row = Vec::with_capacity(b.width() as usize);
            for x in b.min_x..=b.max_x {
                row.push(u8::from(self.occupancy.contains_key(&Cell::new(x, y))));
            }
            rows.push(row);
        }
        rows
    }

    /// Renders the occupied set in the ASCII grid format, built from the
    /// matrix view row by row.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.matrix() {
            for cell in row {
                out.push(if cell == 0 { '0' } else { '1' });
            }
            out.push('\n');
        }
        out
    }

    /// Number of boundary edges of the occupied set.
    #[must_use]
    pub fn perimeter(&self) -> usize {
        self.occupancy
            .keys()
            .flat_map(|c| c.neighbors4())
            .filter(|n| !self.occupancy.contains_key(n))
            .count()
    }

    /// A lightweight planning snapshot: the occupancy index only.
    #[must_use]
    pub fn plan_view(&self) -> PlanView {
        PlanView {
            occupied: self.occupancy.clone(),
        }
    }

    /// Resolves a move set against current positions, skipping `Stay`.
    fn resolve(&self, moves: &MoveSet) -> Result<Vec<PlannedMove>, StepError> {
        let mut planned = Vec::with_capacity(moves.len());
        for (id, mv) in moves.moving() {
            let src = self
                .position(id)
                .ok_or(StepError::UnknownModule(id))?;
            let mut planned_move = PlannedMove::resolve(id, src, mv);
            match self.policy {
                BoundsPolicy::Unbounded => {}
                BoundsPolicy::Strict(window) => {
                    if !window.contains(planned_move.dst) {
                        return Err(StepError::OutOfBounds {
                            module: id,
                            target: planned_move.dst,
                        });
                    }
                }
                BoundsPolicy::Clamp(window) => {
                    if !window.contains(planned_move.dst) {
                        planned_move.dst = src;
                    }
                }
            }
            if planned_move.dst != src {
                planned.push(planned_move);
            }
        }
        Ok(planned)
    }

    /// Applies one simultaneous step. All-or-nothing.
    ///
    /// Validation order: resolve targets (bounds policy), collision
    /// detector, stationary-occupancy check, backbone and whole-ensemble
    /// connectivity, then a single atomic commit.
    pub fn apply(&mut self, moves: &MoveSet) -> Result<(), StepError> {
        let planned = self.resolve(moves)?;
        if planned.is_empty() {
            return Ok(());
        }

        let collisions = collision::detect(&planned);
        if !collisions.is_empty() {
            return Err(StepError::Collision(collisions));
        }

        let moving_cells: FxHashSet<Cell> = planned.iter().map(|m| m.src).collect();
        for m in &planned {
            if let Some(occupant) = self.occupancy.get(&m.dst) {
                if *occupant != m.id && !moving_cells.contains(&m.dst) {
                    return Err(StepError::CellOccupied { cell: m.dst });
                }
            }
        }

        let occupied: FxHashSet<Cell> = self.occupancy.keys().copied().collect();
        if !connectivity::backbone_connected(&occupied, &moving_cells) {
            return Err(StepError::ConnectivityBreak);
        }
        let relocations: Vec<(Cell, Cell)> = planned.iter().map(|m| (m.src, m.dst)).collect();
        if !connectivity::result_connected(&occupied, &relocations) {
            return Err(StepError::ConnectivityBreak);
        }

        // Commit: clear every source, then bind every target.
        for m in &planned {
            let _ = self.occupancy.remove(&m.src);
        }
        for m in &planned {
            let _ = self.occupancy.insert(m.dst, m.id);
            let _ = self.modules.insert(m.id, m.dst);
        }
        Ok(())
    }
}

/// A planning snapshot: the occupancy index, detached from the module table.
///
/// Phases plan against a view and only bind ids at apply time; script
/// sub-steps are simulated here before the real executor sees them.
#[derive(Debug, Clone, Default)]
pub struct PlanView {
    occupied: FxHashMap<Cell, ModuleId>,
}

impl PlanView {
    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    /// Returns true when nothing is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    /// The module occupying `cell`, if any.
    #[must_use]
    pub fn module_at(&self, cell: Cell) -> Option<ModuleId> {
        self.occupied.get(&cell).copied()
    }

    /// Returns true when `cell` is occupied.
    #[must_use]
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.occupied.contains_key(&cell)
    }

    /// The occupied cell set as a hash set.
    #[must_use]
    pub fn occupied_cells(&self) -> FxHashSet<Cell> {
        self.occupied.keys().copied().collect()
    }

    /// Positions keyed by module id, in ascending id order.
    #[must_use]
    pub fn positions(&self) -> BTreeMap<ModuleId, Cell> {
        self.occupied.iter().map(|(c, id)| (*id, *c)).collect()
    }

    /// Bounding box of the occupied set; `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(self.occupied.keys().copied())
    }

    /// Relocates the entries of `moves` without validation.
    ///
    /// Used to roll a scripted sub-step forward on the scratch copy; the
    /// real executor re-validates when the step is eventually applied.
    pub fn apply_unchecked(&mut self, moves: &MoveSet) {
        let positions = self.positions();
        let mut relocated: Vec<(ModuleId, Cell, Cell)> = Vec::with_capacity(moves.len());
        for (id, mv) in moves.moving() {
            if let Some(src) = positions.get(&id) {
                relocated.push((id, *src, mv.applied_to(*src)));
            }
        }
        for (_, src, _) in &relocated {
            let _ = self.occupied.remove(src);
        }
        for (id, _, dst) in &relocated {
            let _ = self.occupied.insert(*dst, *id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Move;

    fn env_from(text: &str) -> Environment {
        Environment::from_grid(text).unwrap()
    }

    #[test]
    fn from_grid_assigns_ids_in_reading_order() {
        let env = env_from("10\n11\n");
        // Top row first: m1 at (0,1); then m2 (0,0), m3 (1,0).
        assert_eq!(env.position(ModuleId::from_raw(1)), Some(Cell::new(0, 1)));
        assert_eq!(env.position(ModuleId::from_raw(2)), Some(Cell::new(0, 0)));
        assert_eq!(env.position(ModuleId::from_raw(3)), Some(Cell::new(1, 0)));
    }

    #[test]
    fn from_grid_rejects_disconnected_input() {
        assert!(matches!(
            Environment::from_grid("101"),
            Err(GridError::Disconnected)
        ));
    }

    #[test]
    fn apply_moves_a_chain_east() {
        let mut env = env_from("111");
        let step: MoveSet = env.modules().map(|(id, _)| (id, Move::East)).collect();
        env.apply(&step).unwrap();
        let cells = env.snapshot();
        let expected: BTreeSet<Cell> = [Cell::new(1, 0), Cell::new(2, 0), Cell::new(3, 0)]
            .into_iter()
            .collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn matrix_backs_the_ascii_rendering() {
        let env = env_from("0110\n1110");
        assert_eq!(env.matrix(), vec![vec![0, 1, 1], vec![1, 1, 1]]);
        assert_eq!(env.render(), "011\n111\n");
        // The rendered text parses back to the snapshot.
        assert_eq!(grid::parse(&env.render()).unwrap(), env.snapshot());
    }

    #[test]
    fn apply_rejects_swap_and_leaves_state_unchanged() {
        let mut env = env_from("11");
        let before = env.snapshot();
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(1), Move::East);
        step.insert(ModuleId::from_raw(2), Move::West);
        let err = env.apply(&step).unwrap_err();
        assert!(matches!(err, StepError::Collision(_)));
        assert_eq!(env.snapshot(), before);
    }

    #[test]
    fn apply_rejects_landing_on_a_stationary_module() {
        let mut env = env_from("11");
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(1), Move::East);
        let err = env.apply(&step).unwrap_err();
        assert!(matches!(err, StepError::CellOccupied { .. }));
    }

    #[test]
    fn apply_rejects_backbone_break() {
        // Middle module of a bar cannot leave while the ends stay.
        let mut env = env_from("111");
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(2), Move::North);
        let err = env.apply(&step).unwrap_err();
        assert!(matches!(err, StepError::ConnectivityBreak));
    }

    #[test]
    fn strict_policy_rejects_out_of_window_targets() {
        let window = Bounds {
            min_x: 0,
            max_x: 2,
            min_y: 0,
            max_y: 0,
        };
        let mut env = Environment::builder()
            .bounds_policy(BoundsPolicy::Strict(window))
            .from_grid("111")
            .unwrap();
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(3), Move::East);
        assert!(matches!(
            env.apply(&step),
            Err(StepError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn clamp_policy_turns_out_of_window_moves_into_stays() {
        let window = Bounds {
            min_x: 0,
            max_x: 2,
            min_y: 0,
            max_y: 0,
        };
        let mut env = Environment::builder()
            .bounds_policy(BoundsPolicy::Clamp(window))
            .from_grid("111")
            .unwrap();
        let before = env.snapshot();
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(3), Move::East);
        env.apply(&step).unwrap();
        assert_eq!(env.snapshot(), before);
    }

    #[test]
    fn single_move_and_inverse_restore_exact_state() {
        let mut env = env_from("11");
        let before_cells = env.snapshot();
        let before_modules: Vec<(ModuleId, Cell)> = env.modules().collect();
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(2), Move::NorthWest);
        env.apply(&step).unwrap();
        env.apply(&step.inverted()).unwrap();
        assert_eq!(env.snapshot(), before_cells);
        assert_eq!(env.modules().collect::<Vec<_>>(), before_modules);
    }

    #[test]
    fn stay_only_step_is_a_no_op() {
        let mut env = env_from("11");
        let before = env.snapshot();
        let mut step = MoveSet::new();
        step.insert(ModuleId::from_raw(1), Move::Stay);
        env.apply(&step).unwrap();
        assert_eq!(env.snapshot(), before);
    }
}
