use bevy::math::UVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The global coordinate and identifier of a tile.
///
/// Level 0 holds the root tiles, every further level doubles the tile count
/// in both directions. Rows are counted from the north.
#[derive(
    Copy, Clone, Default, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct TileCoordinate {
    /// The level of detail of the tile, where 0 is the coarsest level.
    pub level: u32,
    /// The column of the tile, counted from the west.
    pub x: u32,
    /// The row of the tile, counted from the north.
    pub y: u32,
}

impl TileCoordinate {
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    pub fn xy(&self) -> UVec2 {
        UVec2::new(self.x, self.y)
    }

    pub fn parent(self) -> Option<Self> {
        (self.level > 0).then(|| Self::new(self.level - 1, self.x >> 1, self.y >> 1))
    }

    /// The four children in the order north west, north east, south west, south east.
    pub fn children(self) -> [Self; 4] {
        [0, 1, 2, 3].map(|index| {
            Self::new(
                self.level + 1,
                (self.x << 1) + index % 2,
                (self.y << 1) + index / 2,
            )
        })
    }

    /// The index of this tile among its siblings, matching the order of [`Self::children`].
    pub fn child_index(self) -> usize {
        ((self.x & 1) + 2 * (self.y & 1)) as usize
    }

    /// Whether `self` is `other` or lies inside of it.
    pub fn is_descendant_of(self, other: Self) -> bool {
        self.level >= other.level
            && self.x >> (self.level - other.level) == other.x
            && self.y >> (self.level - other.level) == other.y
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_point_back_to_parent() {
        let tile = TileCoordinate::new(3, 5, 2);

        for (index, child) in tile.children().into_iter().enumerate() {
            assert_eq!(child.parent(), Some(tile));
            assert_eq!(child.child_index(), index);
            assert!(child.is_descendant_of(tile));
        }

        assert_eq!(TileCoordinate::new(0, 1, 0).parent(), None);
        assert!(!TileCoordinate::new(4, 0, 0).is_descendant_of(tile));
    }
}
