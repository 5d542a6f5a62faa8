// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! squares-core: parallel reconfiguration planner for sliding squares.
//!
//! A configuration is a 4-connected set of unit modules on the integer
//! grid. The planner turns a start configuration into a goal configuration
//! of equal size through a schedule of simultaneous one-cell slides, each
//! step collision-free and connectivity-preserving. Planning is
//! single-threaded and tick-driven: callers advance the planner one step at
//! a time and observe only fully applied states.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::option_if_let_else,
    clippy::cognitive_complexity
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

mod cell;
mod collision;
mod connectivity;
mod drive;
mod environment;
/// ASCII grid codec for start and goal configurations.
pub mod grid;
mod histogram;
mod metamodule;
mod motion;
mod planner;
mod scaffold;
mod schedule;
mod selector;
mod skeleton;
mod snake;
mod sweepline;
mod targets;
mod telemetry;

// Re-exports for the stable public API.
/// Grid cells and derived bounding boxes.
pub use cell::{Bounds, Cell};
/// Collision taxonomy over simultaneous move sets.
pub use collision::{detect as detect_collisions, is_collision_free, Collision, CollisionKind, PlannedMove};
/// BFS connectivity and backbone checks.
pub use connectivity::{
    backbone_connected, can_move_cell, connected_components, is_connected, is_connected_iter,
    result_connected, safe_moves,
};
/// The shared greedy drive loop (assign, propose, select).
pub use drive::{assign_to_targets, cardinal_step_toward, Drive, DriveRound};
/// The environment, its builder, and the atomic step executor.
pub use environment::{BoundsPolicy, Environment, EnvironmentBuilder, PlanView, StepError};
/// Row compaction and the canonical metamodule goal shape.
pub use histogram::{ideal_shape, Histogram};
/// The 3×3 metamodule state machine.
pub use metamodule::{CleanOutcome, CleanVariant, MetaModule, Role};
/// Unit motions, module identifiers, and move sets.
pub use motion::{ModuleId, Move, MoveSet};
/// The phase controller and its results.
pub use planner::{PhaseId, PhaseResult, PlanError, Planner, PlannerOptions, StallReason};
/// Phase 2 scaffolding shapes.
pub use scaffold::{compute_scaffolding, separator_gaps, sweep_band};
/// Replayable schedules and their statistics.
pub use schedule::{Schedule, ScheduleStats};
/// Deterministic maximal-subset move selection.
pub use selector::select_safe_moves;
/// Phase 1 exoskeleton shapes.
pub use skeleton::compute_exoskeleton;
/// Snake kinematics for Phase 4.
pub use snake::{build_snakes, decide, Facing, HeadDecision, Scan, Snake, SnakeAction};
/// Sweep-line orchestration over stacked metamodules.
pub use sweepline::SweepLine;
/// Phase target sets with the protected center hole.
pub use targets::TargetSet;
