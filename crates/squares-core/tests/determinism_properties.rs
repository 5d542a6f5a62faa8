// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property suites: selector determinism, inverse round trips, codec
//! round trips, and planner safety on arbitrary blobs.
#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::collections::BTreeSet;

use common::connected_blob;
use proptest::prelude::*;
use squares_core::{
    grid, is_connected_iter, select_safe_moves, Cell, Environment, Move, MoveSet, PhaseResult,
    Planner,
};

/// Builds an environment holding exactly `cells`.
fn env_from_cells(cells: &BTreeSet<Cell>) -> Environment {
    let mut env = Environment::builder().empty();
    for &cell in cells {
        env.add_module(cell).unwrap();
    }
    env
}

/// A pseudo-random move for module index `i` under `seed`.
fn move_for(i: usize, seed: u64) -> Move {
    const MOVES: [Move; 9] = [
        Move::Stay,
        Move::North,
        Move::South,
        Move::East,
        Move::West,
        Move::NorthEast,
        Move::NorthWest,
        Move::SouthEast,
        Move::SouthWest,
    ];
    let mut h = seed ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    MOVES[(h as usize) % MOVES.len()]
}

proptest! {
    /// The selector returns the same subset on every invocation, and that
    /// subset is always accepted by the executor.
    #[test]
    fn selector_is_deterministic_and_admissible(
        n in 2usize..9,
        blob_seed in any::<u64>(),
        move_seed in any::<u64>(),
    ) {
        let cells = connected_blob(n, blob_seed);
        let env = env_from_cells(&cells);
        let proposals: MoveSet = env
            .modules()
            .enumerate()
            .map(|(i, (id, _))| (id, move_for(i, move_seed)))
            .collect();

        let view = env.plan_view();
        let first = select_safe_moves(&view, &proposals);
        for _ in 0..3 {
            prop_assert_eq!(select_safe_moves(&view, &proposals), first.clone());
        }

        if !first.is_empty() {
            let mut env = env;
            prop_assert!(env.apply(&first).is_ok());
            prop_assert!(is_connected_iter(env.snapshot().into_iter()));
        }
    }

    /// Applying an accepted single move and then its inverse restores the
    /// exact environment.
    #[test]
    fn accepted_single_move_round_trips(
        n in 2usize..9,
        blob_seed in any::<u64>(),
    ) {
        let cells = connected_blob(n, blob_seed);
        let mut env = env_from_cells(&cells);
        let before_cells = env.snapshot();
        let before_modules: Vec<_> = env.modules().collect();

        let candidates: Vec<_> = env.modules().collect();
        'outer: for (id, _) in candidates {
            for mv in [
                Move::North, Move::South, Move::East, Move::West,
                Move::NorthEast, Move::NorthWest, Move::SouthEast, Move::SouthWest,
            ] {
                let mut step = MoveSet::new();
                step.insert(id, mv);
                if env.apply(&step).is_ok() {
                    env.apply(&step.inverted()).unwrap();
                    break 'outer;
                }
            }
        }
        prop_assert_eq!(env.snapshot(), before_cells);
        prop_assert_eq!(env.modules().collect::<Vec<_>>(), before_modules);
    }

    /// Rendering then parsing reproduces the cell set up to the render
    /// window's origin shift.
    #[test]
    fn grid_codec_round_trips_normalized_sets(
        n in 1usize..12,
        blob_seed in any::<u64>(),
    ) {
        let cells = connected_blob(n, blob_seed);
        let min_x = cells.iter().map(|c| c.x).min().unwrap();
        let min_y = cells.iter().map(|c| c.y).min().unwrap();
        let normalized: BTreeSet<Cell> = cells
            .iter()
            .map(|c| Cell::new(c.x - min_x, c.y - min_y))
            .collect();

        let text = grid::render(&cells);
        let reparsed = grid::parse(&text).unwrap();
        prop_assert_eq!(reparsed, normalized);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever the planner does on arbitrary connected start/goal pairs
    /// of equal size, every tick preserves the count and connectivity.
    #[test]
    fn planner_preserves_invariants_on_random_pairs(
        n in 3usize..7,
        start_seed in any::<u64>(),
        goal_seed in any::<u64>(),
    ) {
        let start = connected_blob(n, start_seed);
        let goal = connected_blob(n, goal_seed);
        let env = env_from_cells(&start);
        let mut planner = Planner::new(env, goal).unwrap();

        for _ in 0..3_000 {
            let result = planner.execute_step();
            let snapshot = planner.environment().snapshot();
            prop_assert_eq!(snapshot.len(), n);
            prop_assert!(is_connected_iter(snapshot.into_iter()));
            match result {
                PhaseResult::Done | PhaseResult::Stall(_) => break,
                PhaseResult::InProgress | PhaseResult::PhaseAdvanced => {}
            }
        }
    }
}
