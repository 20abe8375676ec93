use crate::math::{Cartographic, Ellipsoid};
use bevy::math::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// The largest latitude representable by the web mercator projection (about 85.05°).
pub const MAX_MERCATOR_LATITUDE: f64 = 1.4844222297453322;

/// How the globe is presented.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneMode {
    /// The ellipsoid in cartesian space.
    #[default]
    Scene3D,
    /// The projected map, extruded by the terrain height and seen in perspective.
    ColumbusView,
    /// The projected map seen from above with an orthographic camera.
    Scene2D,
}

impl SceneMode {
    pub fn is_projected(self) -> bool {
        !matches!(self, SceneMode::Scene3D)
    }
}

/// Maps geodetic positions to the plane used by the Columbus View and 2D modes.
/// Projected positions are `(x, y, height)` in meters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MapProjection {
    /// Equirectangular projection, scaled by the ellipsoid's major radius.
    Geographic(Ellipsoid),
    /// Spherical mercator projection, scaled by the ellipsoid's major radius.
    WebMercator(Ellipsoid),
}

impl Default for MapProjection {
    fn default() -> Self {
        Self::Geographic(Ellipsoid::WGS84)
    }
}

impl MapProjection {
    pub fn ellipsoid(&self) -> &Ellipsoid {
        match self {
            MapProjection::Geographic(ellipsoid) | MapProjection::WebMercator(ellipsoid) => {
                ellipsoid
            }
        }
    }

    pub fn project(&self, cartographic: Cartographic) -> DVec3 {
        let semimajor_axis = self.ellipsoid().maximum_radius();

        match self {
            MapProjection::Geographic(_) => DVec3::new(
                cartographic.longitude * semimajor_axis,
                cartographic.latitude * semimajor_axis,
                cartographic.height,
            ),
            MapProjection::WebMercator(_) => DVec3::new(
                cartographic.longitude * semimajor_axis,
                geodetic_latitude_to_mercator_angle(cartographic.latitude) * semimajor_axis,
                cartographic.height,
            ),
        }
    }

    pub fn unproject(&self, projected: DVec3) -> Cartographic {
        let one_over_semimajor_axis = 1.0 / self.ellipsoid().maximum_radius();
        let longitude = projected.x * one_over_semimajor_axis;

        let latitude = match self {
            MapProjection::Geographic(_) => projected.y * one_over_semimajor_axis,
            MapProjection::WebMercator(_) => {
                mercator_angle_to_geodetic_latitude(projected.y * one_over_semimajor_axis)
            }
        };

        Cartographic::new(longitude, latitude, projected.z)
    }
}

pub(crate) fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
    let latitude = latitude.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);

    (FRAC_PI_4 + 0.5 * latitude).tan().ln()
}

pub(crate) fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
    mercator_angle.sinh().atan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn mercator_limit_maps_to_pi() {
        assert!((geodetic_latitude_to_mercator_angle(MAX_MERCATOR_LATITUDE) - PI).abs() < 1e-9);
        assert!((mercator_angle_to_geodetic_latitude(PI) - MAX_MERCATOR_LATITUDE).abs() < 1e-9);
    }

    #[test]
    fn projections_unproject_what_they_project() {
        let position = Cartographic::from_degrees(12.5, -47.25, 320.0);

        for projection in [
            MapProjection::Geographic(Ellipsoid::WGS84),
            MapProjection::WebMercator(Ellipsoid::WGS84),
        ] {
            let result = projection.unproject(projection.project(position));

            assert!((result.longitude - position.longitude).abs() < 1e-12);
            assert!((result.latitude - position.latitude).abs() < 1e-12);
            assert_eq!(result.height, position.height);
        }
    }
}
