// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The planner: phase controller, tick loop, and schedule recording.
//!
//! One external tick is one call to [`Planner::execute_step`]. A tick
//! either drains one queued move set through the executor or asks the
//! active phase to plan; a phase that finishes advances the controller.
//! The controller first attempts the *direct* path — the greedy drive
//! straight toward the goal — and only falls back to the four-phase
//! pipeline (exoskeleton, scaffolding, sweep, histogram plus snakes) when
//! the direct drive stalls. Phase 4 ends with single-module surface crawls
//! that settle the last stragglers one goal cell at a time. No tick spans
//! two phases.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::cell::{Bounds, Cell};
use crate::connectivity;
use crate::drive::{Drive, DriveRound};
use crate::environment::Environment;
use crate::grid::GridError;
use crate::histogram::{self, Histogram};
use crate::motion::{Move, MoveSet};
use crate::scaffold;
use crate::schedule::Schedule;
use crate::selector;
use crate::skeleton;
use crate::snake::{self, Snake, SnakeAction};
use crate::sweepline::SweepLine;
use crate::telemetry;

/// Phase 4's round cap for the final drive toward the goal.
const FINAL_DRIVE_CAP: u64 = 20_000;

/// Consecutive rejected queue steps tolerated before stalling.
const MAX_STRIKES: u32 = 8;

/// Construction-time knobs for the planner's internal caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Round cap for the direct drive and the Phase 1/2 drives; `None`
    /// uses the conventional `2n² + 16`.
    pub drive_cap: Option<u64>,
    /// Round cap for the Phase 4 final drive.
    pub final_drive_cap: u64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            drive_cap: None,
            final_drive_cap: FINAL_DRIVE_CAP,
        }
    }
}

/// Errors detected before planning starts.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The goal grid was malformed or a configuration is disconnected.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Start and goal differ in module count; planning cannot proceed.
    #[error("start has {start} modules but goal has {goal}")]
    UnequalCount {
        /// Module count of the start configuration.
        start: usize,
        /// Cell count of the goal configuration.
        goal: usize,
    },
}

/// Which phase the controller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseId {
    /// Greedy drive straight toward the goal.
    Direct,
    /// Phase 1: migrate onto the exoskeleton.
    Exoskeleton,
    /// Phase 2: build the sweep-line scaffolding.
    Scaffolding,
    /// Phase 3a: sweep west.
    Sweep,
    /// Phase 3b: left-compact the histogram.
    Histogram,
    /// Phase 4: snakes, the final drive, and surface crawls.
    Snakes,
    /// Finished.
    Done,
}

impl core::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Exoskeleton => "exoskeleton",
            Self::Scaffolding => "scaffolding",
            Self::Sweep => "sweep",
            Self::Histogram => "histogram",
            Self::Snakes => "snakes",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why the planner stopped making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallReason {
    /// The phase that stalled.
    pub phase: PhaseId,
    /// A short human-readable cause.
    pub detail: &'static str,
}

impl core::fmt::Display for StallReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "stalled in {}: {}", self.phase, self.detail)
    }
}

/// Result of one external tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseResult {
    /// Work was done (or queued); call again.
    InProgress,
    /// The active phase completed and the controller advanced.
    PhaseAdvanced,
    /// The goal configuration is reached.
    Done,
    /// The planner cannot make progress.
    Stall(StallReason),
}

/// Sub-stage of Phase 4.
enum SnakeStage {
    /// Snakes not yet formed from the histogram.
    Forming,
    /// Snakes walking toward the canonical cells.
    Walking { window: Bounds, snakes: Vec<Snake> },
    /// Greedy drive to the goal.
    Final(Drive),
    /// Single-module surface crawls into the remaining goal cells.
    Crawl,
}

/// Controller state, one variant per phase.
enum PhaseState {
    Direct(Drive),
    Exoskeleton(Option<Drive>),
    Scaffolding(Option<Drive>),
    Sweep { line: SweepLine, west_limit: i32 },
    Histogram,
    Snakes(SnakeStage),
    Done,
}

impl PhaseState {
    const fn id(&self) -> PhaseId {
        match self {
            Self::Direct(_) => PhaseId::Direct,
            Self::Exoskeleton(_) => PhaseId::Exoskeleton,
            Self::Scaffolding(_) => PhaseId::Scaffolding,
            Self::Sweep { .. } => PhaseId::Sweep,
            Self::Histogram => PhaseId::Histogram,
            Self::Snakes(_) => PhaseId::Snakes,
            Self::Done => PhaseId::Done,
        }
    }
}

/// The reconfiguration planner.
pub struct Planner {
    env: Environment,
    goal: BTreeSet<Cell>,
    phase: PhaseState,
    queue: VecDeque<MoveSet>,
    schedule: Schedule,
    options: PlannerOptions,
    tick: u64,
    strikes: u32,
}

impl Planner {
    /// Creates a planner from a start environment and the goal cells.
    ///
    /// Rejects a goal whose cell count differs from the module count and a
    /// goal that is not 4-connected. The planner never creates or destroys
    /// modules; the counts must match up front.
    pub fn new(env: Environment, goal: BTreeSet<Cell>) -> Result<Self, PlanError> {
        Self::with_options(env, goal, PlannerOptions::default())
    }

    /// Creates a planner with explicit iteration caps.
    pub fn with_options(
        env: Environment,
        goal: BTreeSet<Cell>,
        options: PlannerOptions,
    ) -> Result<Self, PlanError> {
        if env.len() != goal.len() {
            return Err(PlanError::UnequalCount {
                start: env.len(),
                goal: goal.len(),
            });
        }
        if !connectivity::is_connected_iter(goal.iter().copied()) {
            return Err(PlanError::Grid(GridError::Disconnected));
        }
        let phase = if env.is_empty() || env.snapshot() == goal {
            PhaseState::Done
        } else {
            let cap = options
                .drive_cap
                .unwrap_or_else(|| Drive::default_cap(env.len()));
            PhaseState::Direct(Drive::new(goal.clone(), cap))
        };
        Ok(Self {
            env,
            goal,
            phase,
            queue: VecDeque::new(),
            schedule: Schedule::new(),
            options,
            tick: 0,
            strikes: 0,
        })
    }

    /// The round cap for the greedy drives.
    fn drive_cap(&self) -> u64 {
        self.options
            .drive_cap
            .unwrap_or_else(|| Drive::default_cap(self.env.len()))
    }

    /// Parses both grids and builds the planner.
    pub fn from_grids(start: &str, goal: &str) -> Result<Self, PlanError> {
        let env = Environment::from_grid(start)?;
        let goal_cells = crate::grid::parse(goal)?;
        Self::new(env, goal_cells.into_iter().collect())
    }

    /// The environment in its current state.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.env
    }

    /// The goal cells.
    #[must_use]
    pub const fn goal(&self) -> &BTreeSet<Cell> {
        &self.goal
    }

    /// The steps applied so far.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The active phase.
    #[must_use]
    pub const fn phase_id(&self) -> PhaseId {
        self.phase.id()
    }

    /// Ticks consumed so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns true once the goal is reached.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self.phase, PhaseState::Done)
    }

    /// Advances the planner by one tick.
    pub fn execute_step(&mut self) -> PhaseResult {
        if matches!(self.phase, PhaseState::Done) {
            return PhaseResult::Done;
        }
        self.tick += 1;
        if self.queue.is_empty() {
            self.plan_next()
        } else {
            self.drain_one()
        }
    }

    /// Runs to completion or `max_ticks`, returning the applied steps.
    pub fn execute_all(&mut self, max_ticks: u64) -> Schedule {
        for _ in 0..max_ticks {
            match self.execute_step() {
                PhaseResult::Done | PhaseResult::Stall(_) => break,
                PhaseResult::InProgress | PhaseResult::PhaseAdvanced => {}
            }
        }
        self.schedule.clone()
    }

    /// Applies the front of the queue through the executor.
    ///
    /// A rejected step is retried as its selector-filtered subset; if that
    /// fails too the queue is dropped and the phase replans.
    fn drain_one(&mut self) -> PhaseResult {
        let Some(step) = self.queue.pop_front() else {
            return PhaseResult::InProgress;
        };
        match self.env.apply(&step) {
            Ok(()) => {
                telemetry::step_applied(self.tick, step.moving().count());
                self.strikes = 0;
                self.schedule.push(step);
                PhaseResult::InProgress
            }
            Err(err) => {
                telemetry::step_rejected(self.tick, &err.to_string());
                let filtered = selector::select_safe_moves(&self.env.plan_view(), &step);
                if !filtered.is_empty() && self.env.apply(&filtered).is_ok() {
                    telemetry::step_applied(self.tick, filtered.moving().count());
                    self.strikes = 0;
                    self.schedule.push(filtered);
                    return PhaseResult::InProgress;
                }
                self.queue.clear();
                self.on_queue_failure()
            }
        }
    }

    /// Recovers from a queue whose steps the executor refused.
    ///
    /// The scripted phases skip forward — a sweep column is passed over, a
    /// compaction pass hands off to Phase 4, a blocked snake retires — and
    /// only the drive-backed phases count strikes toward a stall.
    fn on_queue_failure(&mut self) -> PhaseResult {
        match &mut self.phase {
            PhaseState::Sweep { line, .. } => {
                let shifted = line.shifted_west();
                *line = shifted;
                self.strikes = 0;
                PhaseResult::InProgress
            }
            PhaseState::Histogram => {
                self.phase = PhaseState::Snakes(SnakeStage::Forming);
                self.strikes = 0;
                PhaseResult::PhaseAdvanced
            }
            PhaseState::Snakes(SnakeStage::Walking { snakes, .. }) => {
                if !snakes.is_empty() {
                    let _ = snakes.remove(0);
                }
                self.strikes = 0;
                PhaseResult::InProgress
            }
            _ => self.strike("step rejected by executor"),
        }
    }

    fn strike(&mut self, detail: &'static str) -> PhaseResult {
        self.strikes += 1;
        if self.strikes > MAX_STRIKES {
            telemetry::stall(self.tick, &self.phase.id().to_string());
            PhaseResult::Stall(StallReason {
                phase: self.phase.id(),
                detail,
            })
        } else {
            PhaseResult::InProgress
        }
    }

    fn advance_to(&mut self, next: PhaseState) -> PhaseResult {
        telemetry::phase_entered(self.tick, &next.id().to_string());
        let finished = matches!(next, PhaseState::Done);
        self.phase = next;
        self.strikes = 0;
        if finished {
            PhaseResult::Done
        } else {
            PhaseResult::PhaseAdvanced
        }
    }

    fn enqueue_and_drain(&mut self, steps: Vec<MoveSet>) -> PhaseResult {
        for step in steps {
            self.queue.push_back(step);
        }
        self.drain_one()
    }

    /// Dispatches to the active phase's planning logic.
    fn plan_next(&mut self) -> PhaseResult {
        let phase = core::mem::replace(&mut self.phase, PhaseState::Done);
        match phase {
            PhaseState::Direct(mut drive) => match drive.plan_round(&self.env.plan_view()) {
                DriveRound::Reached => self.advance_to(PhaseState::Done),
                DriveRound::Stalled => self.advance_to(PhaseState::Exoskeleton(None)),
                DriveRound::Step(step) => {
                    self.phase = PhaseState::Direct(drive);
                    if step.is_empty() {
                        PhaseResult::InProgress
                    } else {
                        self.enqueue_and_drain(vec![step])
                    }
                }
            },
            PhaseState::Exoskeleton(drive) => {
                let mut drive = drive.unwrap_or_else(|| {
                    let targets = skeleton::compute_exoskeleton(&self.env.plan_view());
                    Drive::new(targets.as_set().clone(), self.drive_cap())
                });
                match drive.plan_round(&self.env.plan_view()) {
                    DriveRound::Reached => self.advance_to(PhaseState::Scaffolding(None)),
                    DriveRound::Stalled => {
                        // Best effort: the next phase re-derives its own
                        // targets from wherever the drive got to.
                        telemetry::stall(self.tick, "exoskeleton");
                        self.advance_to(PhaseState::Scaffolding(None))
                    }
                    DriveRound::Step(step) => {
                        self.phase = PhaseState::Exoskeleton(Some(drive));
                        if step.is_empty() {
                            PhaseResult::InProgress
                        } else {
                            self.enqueue_and_drain(vec![step])
                        }
                    }
                }
            }
            PhaseState::Scaffolding(drive) => {
                let mut drive = drive.unwrap_or_else(|| {
                    let targets = scaffold::compute_scaffolding(&self.env.plan_view());
                    Drive::new(targets.as_set().clone(), self.drive_cap())
                });
                match drive.plan_round(&self.env.plan_view()) {
                    DriveRound::Reached => {
                        let next = self.sweep_entry();
                        self.advance_to(next)
                    }
                    DriveRound::Stalled => {
                        telemetry::stall(self.tick, "scaffolding");
                        let next = self.sweep_entry();
                        self.advance_to(next)
                    }
                    DriveRound::Step(step) => {
                        self.phase = PhaseState::Scaffolding(Some(drive));
                        if step.is_empty() {
                            PhaseResult::InProgress
                        } else {
                            self.enqueue_and_drain(vec![step])
                        }
                    }
                }
            }
            PhaseState::Sweep { line, west_limit } => {
                if line.x - 1 <= west_limit {
                    return self.advance_to(PhaseState::Histogram);
                }
                let mut scratch = self.env.plan_view();
                let (clean_steps, _settled) = line.plan_clean(&mut scratch, west_limit);
                if !clean_steps.is_empty() {
                    self.phase = PhaseState::Sweep { line, west_limit };
                    return self.enqueue_and_drain(clean_steps);
                }
                let mut gathered = Vec::new();
                for offset in [1, 0, -1] {
                    if let Some(step) = line.plan_gather(&mut scratch, offset) {
                        gathered.push(step);
                    }
                }
                if !gathered.is_empty() {
                    self.phase = PhaseState::Sweep { line, west_limit };
                    return self.enqueue_and_drain(gathered);
                }
                let advance_steps = line.plan_advance(&mut scratch);
                self.phase = PhaseState::Sweep {
                    line: line.shifted_west(),
                    west_limit,
                };
                if advance_steps.is_empty() {
                    PhaseResult::InProgress
                } else {
                    self.enqueue_and_drain(advance_steps)
                }
            }
            PhaseState::Histogram => {
                let Some(hist) = Histogram::from_view(&self.env.plan_view()) else {
                    return self.advance_to(PhaseState::Snakes(SnakeStage::Forming));
                };
                let step = hist.compact_step();
                if step.is_empty() {
                    self.advance_to(PhaseState::Snakes(SnakeStage::Forming))
                } else {
                    self.phase = PhaseState::Histogram;
                    self.enqueue_and_drain(vec![step])
                }
            }
            PhaseState::Snakes(stage) => self.plan_snakes(stage),
            PhaseState::Done => PhaseResult::Done,
        }
    }

    /// The sweep entry state over the current extended bounding box.
    fn sweep_entry(&self) -> PhaseState {
        self.env.bounds().map_or(PhaseState::Histogram, |b| {
            let ext = b.extended_to_height_multiple(3);
            PhaseState::Sweep {
                line: SweepLine::at(ext.max_x - 1, ext),
                west_limit: ext.min_x,
            }
        })
    }

    fn plan_snakes(&mut self, stage: SnakeStage) -> PhaseResult {
        match stage {
            SnakeStage::Forming => {
                let view = self.env.plan_view();
                let Some(bounds) = view.bounds() else {
                    return self.advance_to(PhaseState::Done);
                };
                let canonical = histogram::ideal_shape(view.len(), bounds);
                let window = Bounds::of(canonical.iter().chain(self.goal.iter()).copied())
                    .unwrap_or(bounds);
                let snakes = snake::build_snakes(&view, &canonical);
                self.phase = PhaseState::Snakes(SnakeStage::Walking { window, snakes });
                PhaseResult::InProgress
            }
            SnakeStage::Walking { window, mut snakes } => {
                if let Some(front) = snakes.first_mut() {
                    match front.plan_step(&self.env.plan_view(), window) {
                        SnakeAction::Step(step) => {
                            self.phase =
                                PhaseState::Snakes(SnakeStage::Walking { window, snakes });
                            return self.enqueue_and_drain(vec![step]);
                        }
                        SnakeAction::Retired => {
                            let _ = snakes.remove(0);
                            self.phase =
                                PhaseState::Snakes(SnakeStage::Walking { window, snakes });
                            return PhaseResult::InProgress;
                        }
                    }
                }
                let drive = Drive::new(self.goal.clone(), self.options.final_drive_cap);
                self.phase = PhaseState::Snakes(SnakeStage::Final(drive));
                PhaseResult::InProgress
            }
            SnakeStage::Final(mut drive) => match drive.plan_round(&self.env.plan_view()) {
                DriveRound::Reached => self.advance_to(PhaseState::Done),
                DriveRound::Stalled => {
                    telemetry::stall(self.tick, "snakes");
                    self.phase = PhaseState::Snakes(SnakeStage::Crawl);
                    PhaseResult::InProgress
                }
                DriveRound::Step(step) => {
                    self.phase = PhaseState::Snakes(SnakeStage::Final(drive));
                    if step.is_empty() {
                        PhaseResult::InProgress
                    } else {
                        self.enqueue_and_drain(vec![step])
                    }
                }
            },
            SnakeStage::Crawl => self.plan_crawl(),
        }
    }

    /// One surface crawl: a single surplus module walks along the boundary
    /// into an open goal cell, one slide per tick.
    ///
    /// The mover must not be a cut cell, every intermediate cell must touch
    /// the rest of the ensemble edge-on, and the walk ends on a goal cell
    /// that does the same. Each crawl fills one goal cell, so the stage
    /// terminates after at most `n` crawls.
    fn plan_crawl(&mut self) -> PhaseResult {
        let occupied: FxHashSet<Cell> = self.env.plan_view().occupied_cells();
        let occupied_sorted: BTreeSet<Cell> = occupied.iter().copied().collect();
        if occupied_sorted == self.goal {
            return self.advance_to(PhaseState::Done);
        }

        let extras: Vec<Cell> = occupied_sorted
            .iter()
            .copied()
            .filter(|c| !self.goal.contains(c))
            .collect();
        let unfilled: FxHashSet<Cell> = self
            .goal
            .iter()
            .copied()
            .filter(|c| !occupied.contains(c))
            .collect();
        let region = Bounds::of(occupied.iter().chain(self.goal.iter()).copied())
            .map(|b| b.grown(1));
        let Some(region) = region else {
            return self.advance_to(PhaseState::Done);
        };

        self.phase = PhaseState::Snakes(SnakeStage::Crawl);
        for mover in extras {
            let mut base = occupied.clone();
            let _ = base.remove(&mover);
            if !connectivity::is_connected(&base) {
                continue;
            }
            if let Some(path) = crawl_path(mover, &base, &unfilled, region) {
                let Some(id) = self.env.module_at(mover) else {
                    continue;
                };
                let steps: Vec<MoveSet> = path
                    .windows(2)
                    .filter_map(|w| {
                        step_between(w[0], w[1]).map(|mv| {
                            let mut step = MoveSet::new();
                            step.insert(id, mv);
                            step
                        })
                    })
                    .collect();
                if !steps.is_empty() {
                    return self.enqueue_and_drain(steps);
                }
            }
        }
        telemetry::stall(self.tick, "snakes");
        PhaseResult::Stall(StallReason {
            phase: PhaseId::Snakes,
            detail: "no crawl path into the remaining goal cells",
        })
    }
}

/// BFS through empty cells that keep edge contact with `base`, from
/// `start` to the nearest cell of `unfilled`. Returns the full cell path,
/// `start` included.
fn crawl_path(
    start: Cell,
    base: &FxHashSet<Cell>,
    unfilled: &FxHashSet<Cell>,
    region: Bounds,
) -> Option<Vec<Cell>> {
    let touches_base = |c: Cell| c.neighbors4().iter().any(|n| base.contains(n));
    let mut parents: rustc_hash::FxHashMap<Cell, Cell> = rustc_hash::FxHashMap::default();
    let mut visited: FxHashSet<Cell> = FxHashSet::default();
    let _ = visited.insert(start);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current != start && unfilled.contains(&current) {
            let mut path = vec![current];
            let mut walk = current;
            while let Some(prev) = parents.get(&walk) {
                path.push(*prev);
                walk = *prev;
            }
            path.reverse();
            return Some(path);
        }
        for next in current.neighbors8() {
            if !region.contains(next)
                || base.contains(&next)
                || visited.contains(&next)
                || !touches_base(next)
            {
                continue;
            }
            let _ = visited.insert(next);
            let _ = parents.insert(next, current);
            queue.push_back(next);
        }
    }
    None
}

/// The unit move from `a` to an 8-adjacent `b`.
fn step_between(a: Cell, b: Cell) -> Option<Move> {
    match (b.x - a.x, b.y - a.y) {
        (0, 1) => Some(Move::North),
        (0, -1) => Some(Move::South),
        (1, 0) => Some(Move::East),
        (-1, 0) => Some(Move::West),
        (1, 1) => Some(Move::NorthEast),
        (-1, 1) => Some(Move::NorthWest),
        (1, -1) => Some(Move::SouthEast),
        (-1, -1) => Some(Move::SouthWest),
        _ => None,
    }
}
