//! Geodetic math used by the surface: extents, the reference ellipsoid, bounding volumes
//! and the map projections used by the Columbus View and 2D scene modes.

mod coordinate;
mod culling;
mod projection;
mod tiling_scheme;

pub use coordinate::TileCoordinate;
pub use culling::{BoundingSphere, CullingVolume, Intersect, Plane};
pub use projection::{MapProjection, SceneMode, MAX_MERCATOR_LATITUDE};
pub use tiling_scheme::{TilingScheme, MAXIMUM_LEVEL};

use bevy::math::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Tolerance used when comparing angles in radians.
pub const EPSILON: f64 = 1e-10;

/// A geodetic position in radians and meters above the ellipsoid.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub const fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians(), height)
    }
}

/// A two dimensional region on the globe, given as geodetic radians.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// The largest possible extent, covering the whole globe.
    pub const MAX_VALUE: Extent = Extent {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> Cartographic {
        Cartographic::new(
            0.5 * (self.west + self.east),
            0.5 * (self.south + self.north),
            0.0,
        )
    }

    pub fn south_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }

    pub fn north_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }

    pub fn contains(&self, cartographic: Cartographic) -> bool {
        cartographic.longitude >= self.west
            && cartographic.longitude <= self.east
            && cartographic.latitude >= self.south
            && cartographic.latitude <= self.north
    }

    /// Returns the overlapping region of both extents, or `None` if they only touch or are disjoint.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let west = self.west.max(other.west);
        let south = self.south.max(other.south);
        let east = self.east.min(other.east);
        let north = self.north.min(other.north);

        (east - west > EPSILON && north - south > EPSILON)
            .then(|| Extent::new(west, south, east, north))
    }

    /// Expresses `inner` in the unit space of `self`, where (0, 0) is the south west
    /// and (1, 1) the north east corner.
    pub fn relative(&self, inner: &Extent) -> (DVec2, DVec2) {
        let size = DVec2::new(self.width(), self.height());
        let min = (DVec2::new(inner.west, inner.south) - DVec2::new(self.west, self.south)) / size;
        let max = (DVec2::new(inner.east, inner.north) - DVec2::new(self.west, self.south)) / size;

        (min, max)
    }

    /// Samples a regular grid of `count`x`count` positions spanning the extent.
    pub fn grid(&self, count: usize) -> impl Iterator<Item = Cartographic> + '_ {
        let steps = (count.max(2) - 1) as f64;

        (0..count.max(2)).flat_map(move |row| {
            (0..count.max(2)).map(move |column| {
                Cartographic::new(
                    self.west + self.width() * column as f64 / steps,
                    self.south + self.height() * row as f64 / steps,
                    0.0,
                )
            })
        })
    }
}

/// A triaxial ellipsoid centered at the origin, defining the globe's surface.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub radii: DVec3,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        radii: DVec3::new(6378137.0, 6378137.0, 6356752.314245179),
    };

    pub const UNIT_SPHERE: Ellipsoid = Ellipsoid { radii: DVec3::ONE };

    pub const fn new(radii: DVec3) -> Self {
        Self { radii }
    }

    pub fn maximum_radius(&self) -> f64 {
        self.radii.max_element()
    }

    pub fn minimum_radius(&self) -> f64 {
        self.radii.min_element()
    }

    /// The outward surface normal at the given geodetic position.
    pub fn geodetic_surface_normal(&self, cartographic: Cartographic) -> DVec3 {
        let cos_latitude = cartographic.latitude.cos();

        DVec3::new(
            cos_latitude * cartographic.longitude.cos(),
            cos_latitude * cartographic.longitude.sin(),
            cartographic.latitude.sin(),
        )
        .normalize()
    }

    pub fn cartographic_to_cartesian(&self, cartographic: Cartographic) -> DVec3 {
        let normal = self.geodetic_surface_normal(cartographic);
        let k = self.radii * self.radii * normal;
        let gamma = normal.dot(k).sqrt();

        k / gamma + normal * cartographic.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_touching_extents_is_empty() {
        let west = Extent::new(-1.0, -1.0, 0.0, 1.0);
        let east = Extent::new(0.0, -1.0, 1.0, 1.0);

        assert!(west.intersection(&east).is_none());
        assert_eq!(
            west.intersection(&Extent::MAX_VALUE),
            Some(west),
            "an extent inside the globe intersects to itself"
        );
    }

    #[test]
    fn relative_extent_maps_to_unit_space() {
        let outer = Extent::new(0.0, 0.0, 2.0, 4.0);
        let inner = Extent::new(1.0, 1.0, 2.0, 2.0);

        let (min, max) = outer.relative(&inner);

        assert_eq!(min, DVec2::new(0.5, 0.25));
        assert_eq!(max, DVec2::new(1.0, 0.5));
    }

    #[test]
    fn equator_position_lies_on_major_axis() {
        let position = Ellipsoid::WGS84.cartographic_to_cartesian(Cartographic::default());

        assert!((position.x - 6378137.0).abs() < 1e-6);
        assert!(position.y.abs() < 1e-6 && position.z.abs() < 1e-6);

        let pole = Ellipsoid::WGS84
            .cartographic_to_cartesian(Cartographic::new(0.0, FRAC_PI_2, 100.0));
        assert!((pole.z - 6356852.314245179).abs() < 1e-3);
    }
}
