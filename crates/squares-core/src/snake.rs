// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snakes: serpentine chains of surplus modules along the histogram edge.
//!
//! A snake is a head plus tail segments. The head reads five cells around
//! itself and a pure decision table turns that reading into one of: step
//! along the wall, cut a convex corner, round a concave corner, push into a
//! dead end, retire (the next segment promotes to head), or finish at the
//! bounding box edge. Every tail segment repeats the move its predecessor
//! made one tick earlier.

use std::collections::BTreeSet;

use crate::cell::{Bounds, Cell};
use crate::environment::PlanView;
use crate::histogram::Histogram;
use crate::motion::{ModuleId, Move, MoveSet};

/// Travel directions a head can face. North never arises: snakes start
/// facing south and the table only ever turns them west, east, or south.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Toward smaller y.
    South,
    /// Toward smaller x.
    West,
    /// Toward larger x.
    East,
}

/// The five-cell neighborhood reading of a head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    /// Wall-side cell occupied.
    pub right: bool,
    /// Open-side cell occupied.
    pub left: bool,
    /// Cell straight ahead occupied.
    pub ahead: bool,
    /// Two cells ahead occupied.
    pub far_ahead: bool,
    /// Cell beside the head on the open side occupied.
    pub left_flank: bool,
    /// Cell straight ahead lies outside the working bounding box.
    pub ahead_out_of_bounds: bool,
}

/// What the head decides to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadDecision {
    /// Slide with `mv` and face `facing` afterwards.
    Step {
        /// The head's move this tick.
        mv: Move,
        /// The facing after the move.
        facing: Facing,
    },
    /// The head settles; the next segment takes over.
    Remake,
    /// The bounding box edge is reached; the whole snake retires.
    Done,
}

/// Relative scan offsets for a facing: right, left, ahead, far ahead,
/// left flank.
const fn scan_offsets(facing: Facing) -> [(i32, i32); 5] {
    match facing {
        Facing::South => [(-1, -1), (1, -1), (0, -1), (0, -2), (1, 0)],
        Facing::West => [(-1, 1), (-1, -1), (-1, 0), (-2, 0), (0, -1)],
        Facing::East => [(1, -1), (1, 1), (1, 0), (2, 0), (0, 1)],
    }
}

/// Move/facing for going straight ahead.
const fn ahead_move(facing: Facing) -> (Move, Facing) {
    match facing {
        Facing::South => (Move::South, Facing::South),
        Facing::West => (Move::West, Facing::West),
        Facing::East => (Move::East, Facing::East),
    }
}

/// Move/facing for cutting toward the open side; `None` where the
/// geometry cannot arise.
const fn diagonal_left(facing: Facing) -> Option<(Move, Facing)> {
    match facing {
        Facing::South => Some((Move::SouthEast, Facing::East)),
        Facing::West => Some((Move::SouthWest, Facing::South)),
        Facing::East => None,
    }
}

/// Move/facing for turning around a convex wall corner.
const fn diagonal_right(facing: Facing) -> Option<(Move, Facing)> {
    match facing {
        Facing::South => Some((Move::SouthWest, Facing::West)),
        Facing::West => None,
        Facing::East => Some((Move::SouthEast, Facing::South)),
    }
}

/// Move/facing for sidestepping to the open side without advancing.
const fn just_left(facing: Facing) -> Option<(Move, Facing)> {
    match facing {
        Facing::South => Some((Move::East, Facing::East)),
        Facing::West => Some((Move::South, Facing::South)),
        Facing::East => None,
    }
}

/// The head decision table: a pure function of the facing and the scan.
#[must_use]
pub fn decide(facing: Facing, scan: Scan) -> HeadDecision {
    let step = |entry: Option<(Move, Facing)>| {
        entry.map_or(HeadDecision::Remake, |(mv, facing)| HeadDecision::Step {
            mv,
            facing,
        })
    };

    if scan.ahead_out_of_bounds {
        return HeadDecision::Done;
    }
    if !scan.right && !scan.left && !scan.ahead {
        // Convex corner (or the mouth of a dead end): wrap around the wall.
        return step(diagonal_right(facing));
    }
    if scan.right && !scan.left && !scan.ahead && !scan.far_ahead {
        // Smooth wall on the right: keep going.
        let (mv, facing) = ahead_move(facing);
        return HeadDecision::Step { mv, facing };
    }
    if scan.right && !scan.left && !scan.ahead && scan.far_ahead {
        // Concave corner two cells out: round it early.
        return step(diagonal_left(facing));
    }
    if scan.left && scan.right && !scan.ahead {
        // Inside a dead end: push deeper.
        let (mv, facing) = ahead_move(facing);
        return HeadDecision::Step { mv, facing };
    }
    if scan.left && scan.right && scan.ahead && scan.left_flank {
        // Dead end floor with no side exit: settle here.
        return HeadDecision::Remake;
    }
    if scan.right && scan.ahead && !scan.left {
        // Blocked ahead after a corner, open diagonal on the left.
        return step(diagonal_left(facing).map(|(mv, _)| (mv, facing)));
    }
    if scan.left && scan.right && scan.ahead && !scan.left_flank {
        // Blocked ahead, side exit available.
        return step(just_left(facing));
    }
    if !scan.ahead {
        // Wall only on the open side: keep moving.
        let (mv, facing) = ahead_move(facing);
        return HeadDecision::Step { mv, facing };
    }
    HeadDecision::Remake
}

/// One tail segment: the module and the move it repeats next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// The segment's module.
    pub id: ModuleId,
    /// The move its predecessor performed one tick earlier.
    pub last_move: Move,
}

/// Outcome of planning one snake tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnakeAction {
    /// Apply this step.
    Step(MoveSet),
    /// The snake has fully settled; remove it.
    Retired,
}

/// A head plus its tail, ordered nearest-to-head first.
#[derive(Debug, Clone)]
pub struct Snake {
    head: ModuleId,
    facing: Facing,
    head_last: Move,
    segments: Vec<Segment>,
}

impl Snake {
    /// Creates a snake from its module chain, head first.
    ///
    /// New snakes face south; segment memories start as south moves, which
    /// matches a column that will peel downward on its first tick.
    #[must_use]
    pub fn from_chain(mut chain: Vec<ModuleId>) -> Option<Self> {
        if chain.is_empty() {
            return None;
        }
        let head = chain.remove(0);
        Some(Self {
            head,
            facing: Facing::South,
            head_last: Move::South,
            segments: chain
                .into_iter()
                .map(|id| Segment {
                    id,
                    last_move: Move::South,
                })
                .collect(),
        })
    }

    /// The current head module.
    #[must_use]
    pub const fn head(&self) -> ModuleId {
        self.head
    }

    /// Number of modules still traveling (head included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len() + 1
    }

    /// Returns false always; a snake retires instead of becoming empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Reads the head's five-cell neighborhood from `view`.
    fn scan(&self, view: &PlanView, head_pos: Cell, window: Bounds) -> Scan {
        let offsets = scan_offsets(self.facing);
        let at = |i: usize| {
            let (dx, dy) = offsets[i];
            view.is_occupied(head_pos.offset(dx, dy))
        };
        let (ax, ay) = offsets[2];
        Scan {
            right: at(0),
            left: at(1),
            ahead: at(2),
            far_ahead: at(3),
            left_flank: at(4),
            ahead_out_of_bounds: !window.contains(head_pos.offset(ax, ay)),
        }
    }

    /// Plans one tick against `view`, bounded by `window`.
    ///
    /// On a remake the head settles in place and the nearest segment
    /// promotes; planning continues with the new head in the same tick.
    #[must_use]
    pub fn plan_step(&mut self, view: &PlanView, window: Bounds) -> SnakeAction {
        loop {
            let Some(head_pos) = position_of(view, self.head) else {
                return SnakeAction::Retired;
            };
            let scan = self.scan(view, head_pos, window);
            match decide(self.facing, scan) {
                HeadDecision::Done => return SnakeAction::Retired,
                HeadDecision::Remake => {
                    if self.segments.is_empty() {
                        return SnakeAction::Retired;
                    }
                    let next = self.segments.remove(0);
                    self.head = next.id;
                    self.head_last = next.last_move;
                }
                HeadDecision::Step { mv, facing } => {
                    let mut step = MoveSet::new();
                    step.insert(self.head, mv);
                    let mut ahead_last = self.head_last;
                    for seg in &mut self.segments {
                        step.insert(seg.id, ahead_last);
                        core::mem::swap(&mut ahead_last, &mut seg.last_move);
                    }
                    self.facing = facing;
                    self.head_last = mv;
                    return SnakeAction::Step(step);
                }
            }
        }
    }
}

/// Forms the Phase 4 snakes: per triple of histogram rows, the eastmost
/// column of surplus modules becomes one snake, bottom cell as head.
#[must_use]
pub fn build_snakes(view: &PlanView, goals: &BTreeSet<Cell>) -> Vec<Snake> {
    let Some(hist) = Histogram::from_view(view) else {
        return Vec::new();
    };
    let bounds = hist.bounds();
    let mut snakes = Vec::new();

    for triple in hist.rows().chunks(3) {
        let extent = triple.iter().map(Vec::len).max().unwrap_or(0);
        if extent == 0 {
            continue;
        }
        let x = bounds.min_x + extent as i32 - 1;
        // Top to bottom through the triple, so the bottom cell ends last.
        let mut column: Vec<ModuleId> = Vec::new();
        for row in triple {
            if row.len() == extent {
                if let Some(Some(id)) = row.last() {
                    let pos = position_of(view, *id);
                    let surplus = pos.is_some_and(|p| p.x == x && !goals.contains(&p));
                    if surplus {
                        column.push(*id);
                    }
                }
            }
        }
        // Bottom-most module leads; the rest trail in order of proximity.
        column.reverse();
        if let Some(snake) = Snake::from_chain(column) {
            snakes.push(snake);
        }
    }
    snakes
}

fn position_of(view: &PlanView, id: ModuleId) -> Option<Cell> {
    view.positions().get(&id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn wide_window() -> Bounds {
        Bounds {
            min_x: 0,
            max_x: 3,
            min_y: 0,
            max_y: 2,
        }
    }

    #[test]
    fn decision_follows_a_smooth_wall() {
        let scan = Scan {
            right: true,
            left: false,
            ahead: false,
            far_ahead: false,
            left_flank: false,
            ahead_out_of_bounds: false,
        };
        assert_eq!(
            decide(Facing::South, scan),
            HeadDecision::Step {
                mv: Move::South,
                facing: Facing::South
            }
        );
    }

    #[test]
    fn decision_turns_right_on_a_convex_corner() {
        let scan = Scan {
            right: false,
            left: false,
            ahead: false,
            far_ahead: false,
            left_flank: false,
            ahead_out_of_bounds: false,
        };
        assert_eq!(
            decide(Facing::South, scan),
            HeadDecision::Step {
                mv: Move::SouthWest,
                facing: Facing::West
            }
        );
        // Facing west the right turn would head north; that geometry never
        // occurs and the head settles instead.
        assert_eq!(decide(Facing::West, scan), HeadDecision::Remake);
    }

    #[test]
    fn decision_finishes_at_the_window_edge() {
        let scan = Scan {
            right: true,
            left: false,
            ahead: false,
            far_ahead: false,
            left_flank: false,
            ahead_out_of_bounds: true,
        };
        assert_eq!(decide(Facing::South, scan), HeadDecision::Done);
    }

    #[test]
    fn single_module_snake_walks_into_the_remainder_cell() {
        // Left-packed 10-module histogram with the surplus cell on the top
        // row; the canonical remainder cell (3,0) is open.
        let mut env = Environment::from_grid("1111\n1110\n1110").unwrap();
        let goals = crate::histogram::ideal_shape(10, env.bounds().unwrap());
        assert!(goals.contains(&Cell::new(3, 0)));

        let mut snakes = build_snakes(&env.plan_view(), &goals);
        assert_eq!(snakes.len(), 1);
        assert_eq!(snakes[0].len(), 1);

        let window = wide_window();
        let mut guard = 0;
        loop {
            guard += 1;
            assert!(guard < 20, "snake failed to settle");
            match snakes[0].plan_step(&env.plan_view(), window) {
                SnakeAction::Step(step) => env.apply(&step).unwrap(),
                SnakeAction::Retired => break,
            }
        }
        let occupied: BTreeSet<Cell> = env.snapshot();
        assert_eq!(occupied, goals);
    }

    #[test]
    fn tail_segments_repeat_the_predecessors_move() {
        // A three-module column snake stepping south twice.
        let mut env = Environment::builder().empty();
        // Wall to the snake's right (west side) so it follows it down.
        for y in 0..4 {
            env.add_module(Cell::new(0, y)).unwrap();
        }
        let a = env.add_module(Cell::new(1, 3)).unwrap();
        let b = env.add_module(Cell::new(1, 2)).unwrap();
        let window = Bounds {
            min_x: 0,
            max_x: 1,
            min_y: 0,
            max_y: 3,
        };
        let mut snake = Snake::from_chain(vec![b, a]).unwrap();
        match snake.plan_step(&env.plan_view(), window) {
            SnakeAction::Step(step) => {
                assert_eq!(step.get(b), Some(Move::South));
                // The segment repeats the head's remembered initial move.
                assert_eq!(step.get(a), Some(Move::South));
                env.apply(&step).unwrap();
            }
            SnakeAction::Retired => panic!("snake retired early"),
        }
    }
}
