// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schedules: the ordered record of applied move sets.
//!
//! A schedule is what the planner hands back: one move set per tick, in
//! application order. It is replayable — applying it to the start
//! environment reproduces the final configuration exactly — and, with the
//! `serde` feature, serializable for storage and offline verification.

use crate::environment::{Environment, StepError};
use crate::motion::MoveSet;

/// The ordered list of applied move sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    steps: Vec<MoveSet>,
}

/// Aggregate statistics over a schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleStats {
    /// Number of parallel steps.
    pub makespan: usize,
    /// Number of individual module moves across all steps.
    pub total_moves: usize,
    /// Mean moves per step; zero for an empty schedule.
    pub parallelism: f64,
}

impl Schedule {
    /// An empty schedule.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends one applied step.
    pub fn push(&mut self, step: MoveSet) {
        self.steps.push(step);
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true when no step was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The recorded steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[MoveSet] {
        &self.steps
    }

    /// Computes makespan, move count, and mean parallelism.
    #[must_use]
    pub fn stats(&self) -> ScheduleStats {
        let makespan = self.steps.len();
        let total_moves: usize = self.steps.iter().map(|s| s.moving().count()).sum();
        let parallelism = if makespan == 0 {
            0.0
        } else {
            total_moves as f64 / makespan as f64
        };
        ScheduleStats {
            makespan,
            total_moves,
            parallelism,
        }
    }

    /// Replays the schedule against `env`, step by step.
    ///
    /// Stops at the first rejected step, leaving `env` at the state just
    /// before it.
    pub fn replay(&self, env: &mut Environment) -> Result<(), StepError> {
        for step in &self.steps {
            env.apply(step)?;
        }
        Ok(())
    }
}

impl FromIterator<MoveSet> for Schedule {
    fn from_iter<T: IntoIterator<Item = MoveSet>>(iter: T) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
