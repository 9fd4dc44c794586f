//! Cell and link identifiers, lattice coordinates.

use serde::{Deserialize, Serialize};

/// A unique identifier for a lattice cell.
///
/// The raw value is the row-major linear index of the cell's coordinate,
/// so ascending `CellId` order is the same on every run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CellId(u32);

impl CellId {
    /// Create a cell ID from a raw index.
    #[inline]
    pub fn new(id: u32) -> Self {
        CellId(id)
    }

    /// Return the underlying index.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The index as a `usize`, for slice access.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A unique identifier for a directed neighbor link.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LinkId(u32);

impl LinkId {
    #[inline]
    pub fn new(id: u32) -> Self {
        LinkId(id)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A lattice coordinate, one component per dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coord(Vec<usize>);

impl Coord {
    pub fn new(components: Vec<usize>) -> Self {
        Coord(components)
    }

    /// Number of dimensions.
    pub fn dims(&self) -> usize {
        self.0.len()
    }

    pub fn components(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Coord {
    fn from(components: Vec<usize>) -> Self {
        Coord(components)
    }
}

impl<const N: usize> From<[usize; N]> for Coord {
    fn from(components: [usize; N]) -> Self {
        Coord(components.to_vec())
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_display_and_order() {
        assert_eq!(CellId::new(3).to_string(), "C3");
        assert!(CellId::new(1) < CellId::new(2));
        assert_eq!(CellId::new(9).index(), 9);
    }

    #[test]
    fn test_coord_display() {
        assert_eq!(Coord::from([1, 2, 3]).to_string(), "(1,2,3)");
        assert_eq!(Coord::from([0]).to_string(), "(0)");
    }

    #[test]
    fn test_coord_serde() {
        let c: Coord = serde_json::from_str("[4,5]").unwrap();
        assert_eq!(c, Coord::from([4, 5]));
        assert_eq!(serde_json::to_string(&c).unwrap(), "[4,5]");
    }
}
