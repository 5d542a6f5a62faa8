// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end planner scenarios with per-tick invariant checks.
#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::collections::BTreeSet;

use common::cell_set;
use squares_core::{
    grid, is_connected_iter, Cell, CleanOutcome, CleanVariant, Environment, MetaModule,
    PhaseResult, Planner, StepError,
};

/// Runs the planner to completion, checking the §8-style invariants after
/// every tick: connectivity, uniqueness (implied by the snapshot set), and
/// constant module count.
fn run_checked(start: &str, goal: &str, max_ticks: u64) -> Planner {
    let mut planner = Planner::from_grids(start, goal).unwrap();
    let n = planner.environment().len();
    for _ in 0..max_ticks {
        let result = planner.execute_step();
        let snapshot = planner.environment().snapshot();
        assert_eq!(snapshot.len(), n, "module count changed");
        assert!(
            is_connected_iter(snapshot.into_iter()),
            "configuration disconnected at tick {}",
            planner.tick()
        );
        match result {
            PhaseResult::Done => break,
            PhaseResult::Stall(reason) => panic!("{reason}"),
            PhaseResult::InProgress | PhaseResult::PhaseAdvanced => {}
        }
    }
    planner
}

#[test]
fn horizontal_shift_is_a_single_full_width_step() {
    let planner = run_checked("111", "0111", 50);
    assert!(planner.is_done());
    assert_eq!(planner.schedule().len(), 1);
    assert_eq!(planner.schedule().steps()[0].moving().count(), 3);
}

#[test]
fn l_to_line_reaches_the_goal_cells_exactly() {
    let planner = run_checked("10\n10\n11", "1111", 100);
    assert!(planner.is_done());
    assert!(planner.schedule().len() <= 5);
    let goal: BTreeSet<Cell> = grid::parse("1111").unwrap().into_iter().collect();
    assert_eq!(planner.environment().snapshot(), goal);
}

#[test]
fn square_to_bar_never_breaks_connectivity() {
    let planner = run_checked("111\n111\n111", "111111111", 50_000);
    assert!(planner.is_done());
}

#[test]
fn clean_script_variant_matches_the_shortest_west_row() {
    // Solid metamodule at (5,5); west strip: (3,6) and (3,5) empty,
    // (3,4) occupied. The middle row ties as shortest and wins.
    let mut env = Environment::builder().empty();
    for x in 4..=6 {
        for y in 4..=6 {
            env.add_module(Cell::new(x, y)).unwrap();
        }
    }
    env.add_module(Cell::new(3, 4)).unwrap();
    let mm = MetaModule::new(Cell::new(5, 5));
    let CleanOutcome::Scripts(variant, scripts) = mm.clean(&env.plan_view(), 3) else {
        panic!("expected scripts");
    };
    assert_eq!(variant, CleanVariant::Middle);
    assert_eq!(scripts.len(), 2);
    for step in &scripts {
        env.apply(step).unwrap();
        assert!(is_connected_iter(env.snapshot().into_iter()));
    }
    assert!(mm.is_clean(&env.plan_view()));
}

#[test]
fn swap_and_rotation_cycle_are_rejected_by_the_executor() {
    use squares_core::{ModuleId, Move, MoveSet};

    let mut env = Environment::from_grid("11").unwrap();
    let mut swap = MoveSet::new();
    swap.insert(ModuleId::from_raw(1), Move::East);
    swap.insert(ModuleId::from_raw(2), Move::West);
    assert!(matches!(env.apply(&swap), Err(StepError::Collision(_))));

    // Full 2x2 block rotating in place: a pure four-cycle of cardinal
    // slides. Rejected by default; admitted behind the `rotations` flag.
    let mut env = Environment::from_grid("11\n11").unwrap();
    let view = env.plan_view();
    let mut cycle = MoveSet::new();
    cycle.insert(view.module_at(Cell::new(0, 0)).unwrap(), Move::North);
    cycle.insert(view.module_at(Cell::new(0, 1)).unwrap(), Move::East);
    cycle.insert(view.module_at(Cell::new(1, 1)).unwrap(), Move::South);
    cycle.insert(view.module_at(Cell::new(1, 0)).unwrap(), Move::West);
    let denied = env.apply(&cycle);
    if cfg!(feature = "rotations") {
        assert!(denied.is_ok());
    } else {
        assert!(matches!(denied, Err(StepError::Collision(_))));
    }
}

#[test]
fn scaffold_band_matches_the_twelve_module_scenario() {
    use squares_core::{compute_scaffolding, separator_gaps, sweep_band};

    let env = Environment::from_grid("1111\n1111\n1111").unwrap();
    let targets = compute_scaffolding(&env.plan_view());
    assert_eq!(targets.len(), 12);
    let ext = env.bounds().unwrap();
    let hole = targets.hole().unwrap();
    assert!(!targets.contains(hole));
    for cell in sweep_band(ext) {
        if cell != hole {
            assert!(targets.contains(cell));
        }
    }
    for gap in separator_gaps(ext) {
        assert!(!targets.contains(gap));
    }
}

#[test]
fn ten_module_remainder_is_settled_by_one_snake() {
    use squares_core::{build_snakes, ideal_shape, SnakeAction};

    let mut env = Environment::from_grid("1111\n1110\n1110").unwrap();
    let goals = ideal_shape(10, env.bounds().unwrap());
    let window = env.bounds().unwrap();
    let mut snakes = build_snakes(&env.plan_view(), &goals);
    assert_eq!(snakes.len(), 1);
    assert_eq!(snakes[0].len(), 1);
    loop {
        match snakes[0].plan_step(&env.plan_view(), window) {
            SnakeAction::Step(step) => env.apply(&step).unwrap(),
            SnakeAction::Retired => break,
        }
    }
    assert_eq!(env.snapshot(), goals);
}

#[test]
fn planner_flattens_a_plus_shape_into_a_bar() {
    let planner = run_checked("010\n111\n010\n010", "111111", 50_000);
    assert!(planner.is_done());
    let goal: BTreeSet<Cell> = grid::parse("111111").unwrap().into_iter().collect();
    assert_eq!(planner.environment().snapshot(), goal);
}

#[test]
fn goal_equal_to_start_is_a_noop_plan() {
    let planner = run_checked("11\n11", "11\n11", 10);
    assert!(planner.is_done());
    assert!(planner.schedule().is_empty());
    assert_eq!(
        planner.environment().snapshot(),
        cell_set(&[(0, 0), (1, 0), (0, 1), (1, 1)])
    );
}
