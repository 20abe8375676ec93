//! Terrain providers and the heightmap geometry they produce.

mod geometry;

pub use geometry::TileGeometry;
pub(crate) use geometry::GeometryCache;

use crate::{
    loader::GeometryRequest,
    math::{Ellipsoid, TileCoordinate, TilingScheme},
};
use std::f64::consts::PI;

/// Produces the geometry of terrain tiles.
///
/// Requests are answered asynchronously through the [`GeometryRequest`], which may be
/// completed from any thread.
pub trait TerrainProvider: Send + Sync + 'static {
    fn tiling_scheme(&self) -> TilingScheme;

    /// The maximum geometric error in meters of the tiles at the given level.
    fn level_maximum_geometric_error(&self, level: u32) -> f64;

    /// The deepest level the provider has data for. Deeper tiles are created by
    /// upsampling their parent.
    fn maximum_level(&self) -> Option<u32> {
        None
    }

    fn request_tile_geometry(&self, request: GeometryRequest);

    fn is_tile_available(&self, coordinate: TileCoordinate) -> bool {
        self.maximum_level()
            .map_or(true, |maximum_level| coordinate.level <= maximum_level)
    }
}

/// Estimates the geometric error of the root tiles of a heightmap based provider,
/// assuming the ellipsoid is covered by heightmaps of the given width.
pub fn estimated_level_zero_geometric_error(
    ellipsoid: &Ellipsoid,
    heightmap_width: usize,
    tiling_scheme: TilingScheme,
) -> f64 {
    ellipsoid.maximum_radius() * 2.0 * PI * 0.25
        / (heightmap_width as f64 * tiling_scheme.number_of_x_tiles_at_level(0) as f64)
}

/// A terrain provider producing flat tiles lying on the surface of the ellipsoid.
#[derive(Clone, Debug)]
pub struct EllipsoidTerrainProvider {
    tiling_scheme: TilingScheme,
    heightmap_width: usize,
    level_zero_maximum_geometric_error: f64,
}

impl Default for EllipsoidTerrainProvider {
    fn default() -> Self {
        Self::new(TilingScheme::Geographic, &Ellipsoid::WGS84)
    }
}

impl EllipsoidTerrainProvider {
    pub const HEIGHTMAP_WIDTH: usize = 64;

    pub fn new(tiling_scheme: TilingScheme, ellipsoid: &Ellipsoid) -> Self {
        Self {
            tiling_scheme,
            heightmap_width: Self::HEIGHTMAP_WIDTH,
            level_zero_maximum_geometric_error: estimated_level_zero_geometric_error(
                ellipsoid,
                Self::HEIGHTMAP_WIDTH,
                tiling_scheme,
            ),
        }
    }
}

impl TerrainProvider for EllipsoidTerrainProvider {
    fn tiling_scheme(&self) -> TilingScheme {
        self.tiling_scheme
    }

    fn level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_maximum_geometric_error / (1u64 << level.min(63)) as f64
    }

    fn request_tile_geometry(&self, request: GeometryRequest) {
        let geometry = TileGeometry::flat(self.heightmap_width, self.heightmap_width);
        request.complete(Ok(geometry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometric_error_halves_per_level() {
        let provider = EllipsoidTerrainProvider::default();
        let level_zero = provider.level_maximum_geometric_error(0);

        let expected = 6378137.0 * 2.0 * PI * 0.25 / (64.0 * 2.0);
        assert!((level_zero - expected).abs() < 1e-6);
        assert_eq!(provider.level_maximum_geometric_error(3), level_zero / 8.0);
        assert!(provider.is_tile_available(TileCoordinate::new(30, 0, 0)));
    }
}
