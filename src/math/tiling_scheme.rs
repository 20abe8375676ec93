use crate::math::{
    projection::{geodetic_latitude_to_mercator_angle, mercator_angle_to_geodetic_latitude},
    Cartographic, Extent, TileCoordinate, EPSILON, MAX_MERCATOR_LATITUDE,
};
use bevy::math::UVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// The deepest level whose tile counts still fit into a `u32` in every tiling scheme.
pub const MAXIMUM_LEVEL: u32 = 30;

/// Describes how the globe is subdivided into a quadtree of tiles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TilingScheme {
    /// Equal angle tiles with two root tiles (west and east hemisphere).
    #[default]
    Geographic,
    /// Tiles that are square in the web mercator projection, with a single root tile.
    WebMercator,
}

impl TilingScheme {
    /// The region covered by the tiles of this scheme.
    pub fn extent(self) -> Extent {
        match self {
            TilingScheme::Geographic => Extent::MAX_VALUE,
            TilingScheme::WebMercator => {
                Extent::new(-PI, -MAX_MERCATOR_LATITUDE, PI, MAX_MERCATOR_LATITUDE)
            }
        }
    }

    pub fn number_of_x_tiles_at_level(self, level: u32) -> u32 {
        match self {
            TilingScheme::Geographic => 2 << level,
            TilingScheme::WebMercator => 1 << level,
        }
    }

    pub fn number_of_y_tiles_at_level(self, level: u32) -> u32 {
        1 << level
    }

    pub fn root_tiles(self) -> impl Iterator<Item = TileCoordinate> {
        (0..self.number_of_y_tiles_at_level(0)).flat_map(move |y| {
            (0..self.number_of_x_tiles_at_level(0)).map(move |x| TileCoordinate::new(0, x, y))
        })
    }

    pub fn tile_extent(self, coordinate: TileCoordinate) -> Extent {
        let x_tiles = self.number_of_x_tiles_at_level(coordinate.level) as f64;
        let y_tiles = self.number_of_y_tiles_at_level(coordinate.level) as f64;

        let tile_width = 2.0 * PI / x_tiles;
        let west = -PI + coordinate.x as f64 * tile_width;
        let east = west + tile_width;

        match self {
            TilingScheme::Geographic => {
                let tile_height = PI / y_tiles;
                let north = FRAC_PI_2 - coordinate.y as f64 * tile_height;

                Extent::new(west, north - tile_height, east, north)
            }
            TilingScheme::WebMercator => {
                let tile_height = 2.0 * PI / y_tiles;
                let north = PI - coordinate.y as f64 * tile_height;
                let south = north - tile_height;

                Extent::new(
                    west,
                    mercator_angle_to_geodetic_latitude(south),
                    east,
                    mercator_angle_to_geodetic_latitude(north),
                )
            }
        }
    }

    /// The tile at `level` containing the position, or `None` if it lies outside of the scheme.
    pub fn position_to_tile_xy(self, position: Cartographic, level: u32) -> Option<UVec2> {
        if !self.extent().contains(position) {
            return None;
        }

        let x_tiles = self.number_of_x_tiles_at_level(level);
        let y_tiles = self.number_of_y_tiles_at_level(level);

        let x = ((position.longitude + PI) / (2.0 * PI) * x_tiles as f64) as u32;

        let y = match self {
            TilingScheme::Geographic => (FRAC_PI_2 - position.latitude) / PI * y_tiles as f64,
            TilingScheme::WebMercator => {
                (PI - geodetic_latitude_to_mercator_angle(position.latitude)) / (2.0 * PI)
                    * y_tiles as f64
            }
        } as u32;

        Some(UVec2::new(x.min(x_tiles - 1), y.min(y_tiles - 1)))
    }

    /// The coarsest level whose tiles are no wider than `width` radians.
    pub fn level_for_tile_width(self, width: f64) -> u32 {
        let root_width = 2.0 * PI / self.number_of_x_tiles_at_level(0) as f64;

        if width >= root_width {
            return 0;
        }

        ((root_width / width - EPSILON).log2().ceil().max(0.0) as u32).min(MAXIMUM_LEVEL)
    }

    /// All tiles at `level` that overlap the extent, row by row from the north west.
    pub fn tiles_in_extent(self, extent: &Extent, level: u32) -> Vec<TileCoordinate> {
        let Some(extent) = extent.intersection(&self.extent()) else {
            return Vec::new();
        };

        // shrink slightly, so that tiles merely touching the border are excluded
        let inset_x = (extent.width() * 1e-9).max(EPSILON);
        let inset_y = (extent.height() * 1e-9).max(EPSILON);

        let north_west =
            Cartographic::new(extent.west + inset_x, extent.north - inset_y, 0.0);
        let south_east =
            Cartographic::new(extent.east - inset_x, extent.south + inset_y, 0.0);

        let (Some(min), Some(max)) = (
            self.position_to_tile_xy(north_west, level),
            self.position_to_tile_xy(south_east, level),
        ) else {
            return Vec::new();
        };

        (min.y..=max.y)
            .flat_map(|y| (min.x..=max.x).map(move |x| TileCoordinate::new(level, x, y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geographic_scheme_has_two_roots() {
        let roots = TilingScheme::Geographic.root_tiles().collect::<Vec<_>>();

        assert_eq!(roots.len(), 2);
        assert_eq!(
            TilingScheme::Geographic.tile_extent(roots[0]),
            Extent::new(-PI, -FRAC_PI_2, 0.0, FRAC_PI_2)
        );
        assert_eq!(TilingScheme::WebMercator.root_tiles().count(), 1);
    }

    #[test]
    fn children_partition_their_parent() {
        for scheme in [TilingScheme::Geographic, TilingScheme::WebMercator] {
            let parent = TileCoordinate::new(2, 3, 1);
            let parent_extent = scheme.tile_extent(parent);
            let [north_west, _, _, south_east] =
                parent.children().map(|child| scheme.tile_extent(child));

            assert!((north_west.west - parent_extent.west).abs() < 1e-12);
            assert!((north_west.north - parent_extent.north).abs() < 1e-12);
            assert!((south_east.east - parent_extent.east).abs() < 1e-12);
            assert!((south_east.south - parent_extent.south).abs() < 1e-12);
        }
    }

    #[test]
    fn tiles_in_extent_excludes_touching_tiles() {
        let scheme = TilingScheme::Geographic;
        let tile = TileCoordinate::new(3, 4, 2);

        assert_eq!(
            scheme.tiles_in_extent(&scheme.tile_extent(tile), 3),
            vec![tile]
        );
        assert_eq!(
            scheme.tiles_in_extent(&scheme.tile_extent(tile), 4),
            tile.children().to_vec()
        );
        assert_eq!(
            scheme.tiles_in_extent(&scheme.tile_extent(tile), 1),
            vec![TileCoordinate::new(1, 1, 0)]
        );
    }

    #[test]
    fn level_for_tile_width_picks_first_fine_enough_level() {
        let scheme = TilingScheme::WebMercator;

        assert_eq!(scheme.level_for_tile_width(2.0 * PI), 0);
        assert_eq!(scheme.level_for_tile_width(PI), 1);
        assert_eq!(scheme.level_for_tile_width(0.9 * PI), 2);
        assert_eq!(TilingScheme::Geographic.level_for_tile_width(PI / 4.0), 2);
    }

    #[test]
    fn deepest_level_does_not_overflow() {
        assert_eq!(TilingScheme::Geographic.level_for_tile_width(0.0), MAXIMUM_LEVEL);
        assert_eq!(TilingScheme::Geographic.number_of_x_tiles_at_level(MAXIMUM_LEVEL), 1 << 31);
        assert_eq!(TilingScheme::WebMercator.number_of_y_tiles_at_level(MAXIMUM_LEVEL), 1 << 30);
    }
}
