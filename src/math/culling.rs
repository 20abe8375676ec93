use crate::math::{Ellipsoid, Extent, MapProjection};
use bevy::math::{DVec3, DVec4};

/// The result of testing a bounding volume against a [`CullingVolume`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intersect {
    Outside,
    Intersecting,
    Inside,
}

/// A plane in Hessian normal form, `normal · p + distance = 0`.
/// Points with a positive signed distance lie on the inner side.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Plane {
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }

    pub fn as_dvec4(&self) -> DVec4 {
        self.normal.extend(self.distance)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn from_points(points: &[DVec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let (min, max) = points.iter().fold(
            (DVec3::splat(f64::MAX), DVec3::splat(f64::MIN)),
            |(min, max), &point| (min.min(point), max.max(point)),
        );

        let center = 0.5 * (min + max);
        let radius = points
            .iter()
            .map(|point| point.distance(center))
            .fold(0.0, f64::max);

        Self { center, radius }
    }

    /// Bounds the part of the ellipsoid covered by the extent, between the two heights.
    pub fn from_extent_3d(
        extent: &Extent,
        ellipsoid: &Ellipsoid,
        minimum_height: f64,
        maximum_height: f64,
    ) -> Self {
        let points = [minimum_height, maximum_height]
            .into_iter()
            .flat_map(|height| {
                extent.grid(5).map(move |mut cartographic| {
                    cartographic.height = height;
                    cartographic
                })
            })
            .map(|cartographic| ellipsoid.cartographic_to_cartesian(cartographic))
            .collect::<Vec<_>>();

        Self::from_points(&points)
    }

    /// Bounds the projected extent as a box in the plane of the map projection.
    pub fn from_extent_projected(
        extent: &Extent,
        projection: &MapProjection,
        minimum_height: f64,
        maximum_height: f64,
    ) -> Self {
        let south_west = projection.project(extent.south_west());
        let north_east = projection.project(extent.north_east());

        let min = south_west.truncate().extend(minimum_height);
        let max = north_east.truncate().extend(maximum_height);

        Self::new(0.5 * (min + max), 0.5 * min.distance(max))
    }

    pub fn distance_to(&self, point: DVec3) -> f64 {
        (point.distance(self.center) - self.radius).max(0.0)
    }
}

/// A convex volume bounded by planes whose normals point inward.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CullingVolume {
    pub planes: Vec<Plane>,
}

impl CullingVolume {
    pub fn new(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    pub fn visibility(&self, sphere: &BoundingSphere) -> Intersect {
        let mut intersecting = false;

        for plane in &self.planes {
            let distance = plane.signed_distance(sphere.center);

            if distance < -sphere.radius {
                return Intersect::Outside;
            } else if distance < sphere.radius {
                intersecting = true;
            }
        }

        if intersecting {
            Intersect::Intersecting
        } else {
            Intersect::Inside
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_behind_plane_is_outside() {
        let volume = CullingVolume::new(vec![Plane::from_point_normal(DVec3::ZERO, DVec3::X)]);

        let behind = BoundingSphere::new(DVec3::new(-2.0, 0.0, 0.0), 1.0);
        let straddling = BoundingSphere::new(DVec3::new(0.5, 0.0, 0.0), 1.0);
        let front = BoundingSphere::new(DVec3::new(2.0, 0.0, 0.0), 1.0);

        assert_eq!(volume.visibility(&behind), Intersect::Outside);
        assert_eq!(volume.visibility(&straddling), Intersect::Intersecting);
        assert_eq!(volume.visibility(&front), Intersect::Inside);
    }

    #[test]
    fn extent_sphere_contains_its_corners() {
        let extent = Extent::from_degrees(10.0, 20.0, 30.0, 40.0);
        let ellipsoid = Ellipsoid::WGS84;
        let sphere = BoundingSphere::from_extent_3d(&extent, &ellipsoid, 0.0, 1000.0);

        for corner in extent.grid(2) {
            let position = ellipsoid.cartographic_to_cartesian(corner);
            assert!(position.distance(sphere.center) <= sphere.radius + 1e-6);
        }
    }
}
