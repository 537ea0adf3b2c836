//! Directions, direction sets, and section keys.
//!
//! The section set is closed and fixed at seven entries: the center reservoir
//! plus one per face. Everything downstream indexes fixed-size arrays off
//! this closed set; there are no open-ended collections of directions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six pipe faces.
///
/// The declaration order is the wire and iteration order (North, South, East,
/// West, Up, Down) and must stay identical on both ends of the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    /// All six faces in wire order.
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    /// Stable index in `0..6`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`index`](Direction::index).
    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }

    /// The opposing face.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Unit vector along this face's axis, as (x, y, z) components.
    ///
    /// North/South run along -z/+z, East/West along +x/-x, Up/Down along
    /// +y/-y. Consumers needing a float vector convert on their side.
    pub fn unit_vector(self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// DirSet
// ---------------------------------------------------------------------------

/// A set of directions, packed into a 6-bit mask.
///
/// The direction set is closed, so a bitmask beats any heap collection: copy
/// semantics, O(1) everything, and a stable iteration order (wire order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirSet(u8);

impl DirSet {
    /// The empty set.
    pub const EMPTY: DirSet = DirSet(0);

    /// A set containing every face.
    pub const ALL: DirSet = DirSet(0b11_1111);

    /// A set containing exactly one face.
    pub fn only(dir: Direction) -> DirSet {
        DirSet(1 << dir.index())
    }

    pub fn insert(&mut self, dir: Direction) {
        self.0 |= 1 << dir.index();
    }

    pub fn remove(&mut self, dir: Direction) {
        self.0 &= !(1 << dir.index());
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    /// Number of faces in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set intersection.
    pub fn intersection(self, other: DirSet) -> DirSet {
        DirSet(self.0 & other.0)
    }

    /// Iterate members in wire order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirSet::EMPTY;
        for dir in iter {
            set.insert(dir);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// SectionKey
// ---------------------------------------------------------------------------

/// Identifies one of the seven sections of a pipe node: the center reservoir
/// or one of the six faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKey {
    Center,
    Face(Direction),
}

impl SectionKey {
    /// All seven section keys in wire order: center first, then the faces.
    pub const ALL: [SectionKey; 7] = [
        SectionKey::Center,
        SectionKey::Face(Direction::North),
        SectionKey::Face(Direction::South),
        SectionKey::Face(Direction::East),
        SectionKey::Face(Direction::West),
        SectionKey::Face(Direction::Up),
        SectionKey::Face(Direction::Down),
    ];

    /// Number of sections per node.
    pub const COUNT: usize = 7;

    /// Stable index in `0..7`; center is 0, faces follow in wire order.
    pub fn index(self) -> usize {
        match self {
            SectionKey::Center => 0,
            SectionKey::Face(dir) => 1 + dir.index(),
        }
    }

    /// The face this key names, or `None` for the center.
    pub fn face(self) -> Option<Direction> {
        match self {
            SectionKey::Center => None,
            SectionKey::Face(dir) => Some(dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_index_round_trips() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_index(dir.index()), Some(dir));
        }
        assert_eq!(Direction::from_index(6), None);
    }

    #[test]
    fn opposite_is_involution() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
        }
    }

    #[test]
    fn unit_vectors_oppose() {
        for dir in Direction::ALL {
            let (x, y, z) = dir.unit_vector();
            let (ox, oy, oz) = dir.opposite().unit_vector();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
        }
    }

    #[test]
    fn dirset_basic_ops() {
        let mut set = DirSet::EMPTY;
        assert!(set.is_empty());

        set.insert(Direction::North);
        set.insert(Direction::Up);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Direction::North));
        assert!(!set.contains(Direction::South));

        set.remove(Direction::North);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(Direction::North));
    }

    #[test]
    fn dirset_only_has_single_member() {
        for dir in Direction::ALL {
            let set = DirSet::only(dir);
            assert_eq!(set.len(), 1);
            assert!(set.contains(dir));
        }
    }

    #[test]
    fn dirset_iterates_in_wire_order() {
        let set: DirSet = [Direction::Down, Direction::North, Direction::West]
            .into_iter()
            .collect();
        let order: Vec<Direction> = set.iter().collect();
        assert_eq!(order, vec![Direction::North, Direction::West, Direction::Down]);
    }

    #[test]
    fn dirset_intersection() {
        let a: DirSet = [Direction::North, Direction::South].into_iter().collect();
        let b: DirSet = [Direction::South, Direction::East].into_iter().collect();
        let both = a.intersection(b);
        assert_eq!(both.len(), 1);
        assert!(both.contains(Direction::South));
    }

    #[test]
    fn section_key_indices_are_a_bijection() {
        let mut seen = [false; SectionKey::COUNT];
        for key in SectionKey::ALL {
            let idx = key.index();
            assert!(!seen[idx], "duplicate index {idx}");
            seen[idx] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn center_is_first_in_wire_order() {
        assert_eq!(SectionKey::ALL[0], SectionKey::Center);
        assert_eq!(SectionKey::Center.index(), 0);
        assert_eq!(SectionKey::Center.face(), None);
        assert_eq!(
            SectionKey::Face(Direction::North).face(),
            Some(Direction::North)
        );
    }
}
