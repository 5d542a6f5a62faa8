// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared helpers for the integration suites.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::BTreeSet;

use squares_core::{Cell, Environment};

/// Builds an environment from absolute cells, reading order independent.
pub fn env_of(cells: &[(i32, i32)]) -> Environment {
    let mut env = Environment::builder().empty();
    for &(x, y) in cells {
        env.add_module(Cell::new(x, y)).unwrap();
    }
    env
}

/// Collects a cell slice into an ordered set.
pub fn cell_set(cells: &[(i32, i32)]) -> BTreeSet<Cell> {
    cells.iter().map(|&(x, y)| Cell::new(x, y)).collect()
}

/// Grows a deterministic connected configuration of `n` cells from the
/// origin, steering with `seed`.
pub fn connected_blob(n: usize, seed: u64) -> BTreeSet<Cell> {
    let mut cells = BTreeSet::new();
    let _ = cells.insert(Cell::new(0, 0));
    let mut state = seed | 1;
    while cells.len() < n {
        // xorshift64; pick an existing cell, then one of its free sides.
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let host = *cells
            .iter()
            .nth((state as usize) % cells.len())
            .unwrap();
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let side = host.neighbors4()[(state as usize) % 4];
        let _ = cells.insert(side);
    }
    cells
}
