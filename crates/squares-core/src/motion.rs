// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unit motions, module identifiers, and simultaneous move sets.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::cell::Cell;

/// One unit motion: stay in place, or slide one cell along a cardinal or
/// diagonal delta. The delta vector is inherent to the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Move {
    /// No motion this step.
    Stay,
    /// `(0, 1)`
    North,
    /// `(0, -1)`
    South,
    /// `(1, 0)`
    East,
    /// `(-1, 0)`
    West,
    /// `(1, 1)`
    NorthEast,
    /// `(-1, 1)`
    NorthWest,
    /// `(1, -1)`
    SouthEast,
    /// `(-1, -1)`
    SouthWest,
}

impl Move {
    /// The delta vector `(dx, dy)` of this motion.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Stay => (0, 0),
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
            Self::NorthEast => (1, 1),
            Self::NorthWest => (-1, 1),
            Self::SouthEast => (1, -1),
            Self::SouthWest => (-1, -1),
        }
    }

    /// The motion with the opposite delta.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Stay => Self::Stay,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::NorthEast => Self::SouthWest,
            Self::NorthWest => Self::SouthEast,
            Self::SouthEast => Self::NorthWest,
            Self::SouthWest => Self::NorthEast,
        }
    }

    /// Returns true for the four axis-aligned unit motions.
    #[must_use]
    pub const fn is_cardinal(self) -> bool {
        matches!(self, Self::North | Self::South | Self::East | Self::West)
    }

    /// Returns true for the four corner motions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::NorthWest | Self::SouthEast | Self::SouthWest
        )
    }

    /// Returns true for [`Move::Stay`].
    #[must_use]
    pub const fn is_stay(self) -> bool {
        matches!(self, Self::Stay)
    }

    /// Applies the delta to `cell`.
    #[must_use]
    pub const fn applied_to(self, cell: Cell) -> Cell {
        let (dx, dy) = self.delta();
        cell.offset(dx, dy)
    }
}

/// Process-unique module identifier.
///
/// Identifiers are positive, assigned once by the environment's allocator on
/// creation, and never reused. Zero is reserved as invalid; the allocator
/// never hands it out.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleId(u32);

impl ModuleId {
    /// Constructs a `ModuleId` from a raw value.
    ///
    /// Constructing `ModuleId(0)` is allowed for sentinels, but environment
    /// operations treat it as unknown.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// One simultaneous step: a mapping from module id to its motion.
///
/// Insertion is last-wins per module. Iteration is in ascending module id,
/// which every deterministic path in the planner relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveSet(BTreeMap<ModuleId, Move>);

impl MoveSet {
    /// Creates an empty move set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records `mv` for `id`, replacing any earlier entry for the same id.
    pub fn insert(&mut self, id: ModuleId, mv: Move) {
        let _ = self.0.insert(id, mv);
    }

    /// Returns the recorded motion for `id`, if any.
    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<Move> {
        self.0.get(&id).copied()
    }

    /// Returns true when `id` has an entry.
    #[must_use]
    pub fn contains(&self, id: ModuleId) -> bool {
        self.0.contains_key(&id)
    }

    /// Removes the entry for `id`, returning it if present.
    pub fn remove(&mut self, id: ModuleId) -> Option<Move> {
        self.0.remove(&id)
    }

    /// Number of entries, including `Stay` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no module has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all entries in ascending module id.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, Move)> + '_ {
        self.0.iter().map(|(id, mv)| (*id, *mv))
    }

    /// Iterates over the entries that actually move (skips `Stay`).
    pub fn moving(&self) -> impl Iterator<Item = (ModuleId, Move)> + '_ {
        self.iter().filter(|(_, mv)| !mv.is_stay())
    }

    /// Merges all entries of `other` into `self` (last-wins).
    pub fn extend_from(&mut self, other: &Self) {
        for (id, mv) in other.iter() {
            self.insert(id, mv);
        }
    }

    /// The move set that undoes this one (every delta inverted).
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self(self.0.iter().map(|(id, mv)| (*id, mv.inverse())).collect())
    }
}

impl FromIterator<(ModuleId, Move)> for MoveSet {
    fn from_iter<T: IntoIterator<Item = (ModuleId, Move)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MoveSet {
    type Item = (ModuleId, Move);
    type IntoIter = btree_map::IntoIter<ModuleId, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_move_inverts_to_its_opposite_delta() {
        for mv in [
            Move::Stay,
            Move::North,
            Move::South,
            Move::East,
            Move::West,
            Move::NorthEast,
            Move::NorthWest,
            Move::SouthEast,
            Move::SouthWest,
        ] {
            let (dx, dy) = mv.delta();
            let (ix, iy) = mv.inverse().delta();
            assert_eq!((dx + ix, dy + iy), (0, 0));
        }
    }

    #[test]
    fn move_set_iterates_in_ascending_id_order() {
        let mut ms = MoveSet::new();
        ms.insert(ModuleId::from_raw(9), Move::West);
        ms.insert(ModuleId::from_raw(2), Move::East);
        ms.insert(ModuleId::from_raw(5), Move::Stay);
        let ids: Vec<u32> = ms.iter().map(|(id, _)| id.value()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        let moving: Vec<u32> = ms.moving().map(|(id, _)| id.value()).collect();
        assert_eq!(moving, vec![2, 9]);
    }

    #[test]
    fn insert_is_last_wins() {
        let mut ms = MoveSet::new();
        let id = ModuleId::from_raw(3);
        ms.insert(id, Move::North);
        ms.insert(id, Move::South);
        assert_eq!(ms.get(id), Some(Move::South));
        assert_eq!(ms.len(), 1);
    }
}
