//! The read-only per-frame input of the surface: the camera, the scene mode and the
//! map projection used by the projected scene modes.

use crate::math::{
    BoundingSphere, Cartographic, CullingVolume, Ellipsoid, Extent, MapProjection, Plane,
    SceneMode,
};
use bevy::{
    math::{DVec2, DVec3, UVec2},
    prelude::*,
};

/// The viewing volume of a [`Camera`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Frustum {
    Perspective {
        /// Vertical field of view in radians.
        fovy: f64,
        aspect_ratio: f64,
        near: f64,
        far: f64,
    },
    Orthographic {
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    },
}

impl Default for Frustum {
    fn default() -> Self {
        Self::perspective(4.0 / 3.0)
    }
}

impl Frustum {
    /// A perspective frustum with a 60 degree vertical field of view.
    pub fn perspective(aspect_ratio: f64) -> Self {
        Self::Perspective {
            fovy: 60.0_f64.to_radians(),
            aspect_ratio,
            near: 1.0,
            far: 5e8,
        }
    }
}

/// A camera positioned in world space for [`SceneMode::Scene3D`]
/// and in projected `(x, y, height)` space for the projected scene modes.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub direction: DVec3,
    pub up: DVec3,
    pub frustum: Frustum,
    /// The size of the drawing buffer in pixels.
    pub viewport: UVec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 2.5e7),
            direction: DVec3::NEG_Z,
            up: DVec3::Y,
            frustum: default(),
            viewport: UVec2::new(800, 600),
        }
    }
}

impl Camera {
    pub fn right(&self) -> DVec3 {
        self.direction.cross(self.up).normalize()
    }

    /// Points the camera from `position` towards `target`.
    pub fn look_at(&mut self, position: DVec3, target: DVec3, up: DVec3) {
        self.position = position;
        self.direction = (target - position).normalize();

        let right = self.direction.cross(up);
        let right = if right.length_squared() < 1e-12 {
            self.direction.any_orthonormal_vector()
        } else {
            right.normalize()
        };

        self.up = right.cross(self.direction).normalize();
    }

    /// Moves the camera so that the whole extent is in view for the given scene mode.
    pub fn view_extent(&mut self, extent: &Extent, mode: SceneMode, projection: &MapProjection) {
        let aspect_ratio = self.viewport.x as f64 / self.viewport.y.max(1) as f64;

        match mode {
            SceneMode::Scene3D => {
                let ellipsoid = projection.ellipsoid();
                let center = extent.center();
                let size = extent.width().max(extent.height()) * ellipsoid.maximum_radius();
                let distance = 0.5 * size / self.half_fovy().tan();

                let surface = ellipsoid.cartographic_to_cartesian(center);
                let normal = ellipsoid.geodetic_surface_normal(center);

                self.look_at(surface + normal * distance, surface, DVec3::Z);
            }
            SceneMode::ColumbusView => {
                let (min, max) = projected_bounds(extent, projection);
                let size = (max - min).max_element();
                let distance = 0.5 * size / self.half_fovy().tan();
                let center = 0.5 * (min + max);

                self.look_at(center.extend(distance), center.extend(0.0), DVec3::Y);
            }
            SceneMode::Scene2D => {
                let (min, max) = projected_bounds(extent, projection);
                let center = 0.5 * (min + max);
                let half_width = 0.5 * (max.x - min.x).max((max.y - min.y) * aspect_ratio);
                let half_height = half_width / aspect_ratio;

                self.position = center.extend(projection.ellipsoid().maximum_radius());
                self.direction = DVec3::NEG_Z;
                self.up = DVec3::Y;
                self.frustum = Frustum::Orthographic {
                    left: -half_width,
                    right: half_width,
                    bottom: -half_height,
                    top: half_height,
                    near: 1.0,
                    far: 2.0 * projection.ellipsoid().maximum_radius(),
                };
            }
        }
    }

    fn half_fovy(&self) -> f64 {
        match self.frustum {
            Frustum::Perspective { fovy, .. } => 0.5 * fovy,
            Frustum::Orthographic { .. } => 30.0_f64.to_radians(),
        }
    }

    /// Computes the planes bounding the visible volume.
    pub fn culling_volume(&self) -> CullingVolume {
        let position = self.position;
        let direction = self.direction;
        let up = self.up;
        let right = self.right();

        let (left, right_offset, bottom, top, near, far) = match self.frustum {
            Frustum::Perspective {
                fovy,
                aspect_ratio,
                near,
                far,
            } => {
                let top = near * (0.5 * fovy).tan();
                let right_offset = aspect_ratio * top;
                (-right_offset, right_offset, -top, top, near, far)
            }
            Frustum::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => (left, right, bottom, top, near, far),
        };

        let near_center = position + direction * near;
        let far_center = position + direction * far;

        let mut planes = Vec::with_capacity(6);

        match self.frustum {
            Frustum::Perspective { .. } => {
                let edge = |offset: DVec3| (near_center + offset - position).normalize();

                let normal = edge(right * left).cross(up).normalize();
                planes.push(Plane::from_point_normal(position, normal));
                let normal = up.cross(edge(right * right_offset)).normalize();
                planes.push(Plane::from_point_normal(position, normal));
                let normal = right.cross(edge(up * bottom)).normalize();
                planes.push(Plane::from_point_normal(position, normal));
                let normal = edge(up * top).cross(right).normalize();
                planes.push(Plane::from_point_normal(position, normal));
            }
            Frustum::Orthographic { .. } => {
                planes.push(Plane::from_point_normal(position + right * left, right));
                planes.push(Plane::from_point_normal(position + right * right_offset, -right));
                planes.push(Plane::from_point_normal(position + up * bottom, up));
                planes.push(Plane::from_point_normal(position + up * top, -up));
            }
        }

        planes.push(Plane::from_point_normal(near_center, direction));
        planes.push(Plane::from_point_normal(far_center, -direction));

        CullingVolume::new(planes)
    }

    /// The size in world units that one pixel covers at the given distance.
    pub fn pixel_size(&self, distance: f64) -> f64 {
        let viewport_height = self.viewport.y.max(1) as f64;

        match self.frustum {
            Frustum::Perspective { fovy, .. } => {
                distance.max(f64::EPSILON) * 2.0 * (0.5 * fovy).tan() / viewport_height
            }
            Frustum::Orthographic { left, right, .. } => {
                (right - left) / self.viewport.x.max(1) as f64
            }
        }
    }

    /// The projected rectangle seen by an orthographic camera, as `(min, max)`.
    pub fn orthographic_bounds(&self) -> Option<(DVec2, DVec2)> {
        match self.frustum {
            Frustum::Orthographic {
                left,
                right,
                bottom,
                top,
                ..
            } => {
                let center = self.position.truncate();
                Some((
                    center + DVec2::new(left, bottom),
                    center + DVec2::new(right, top),
                ))
            }
            Frustum::Perspective { .. } => None,
        }
    }
}

/// The projected bounds of an extent as `(min, max)`.
pub(crate) fn projected_bounds(extent: &Extent, projection: &MapProjection) -> (DVec2, DVec2) {
    let south_west = projection.project(extent.south_west()).truncate();
    let north_east = projection.project(extent.north_east()).truncate();

    (south_west, north_east)
}

/// The state of the scene for the frame being rendered.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct FrameState {
    pub frame_number: u64,
    pub mode: SceneMode,
    pub projection: MapProjection,
    pub camera: Camera,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            frame_number: 0,
            mode: SceneMode::Scene3D,
            projection: default(),
            camera: default(),
        }
    }
}

impl FrameState {
    pub fn ellipsoid(&self) -> &Ellipsoid {
        self.projection.ellipsoid()
    }

    /// Switches to a scene mode and moves the camera to view the extent.
    pub fn view_extent(&mut self, extent: &Extent, mode: SceneMode) {
        self.mode = mode;

        if mode != SceneMode::Scene2D && matches!(self.camera.frustum, Frustum::Orthographic { .. })
        {
            let aspect_ratio =
                self.camera.viewport.x as f64 / self.camera.viewport.y.max(1) as f64;
            self.camera.frustum = Frustum::perspective(aspect_ratio);
        }

        self.camera.view_extent(extent, mode, &self.projection);
    }

    /// The bounding volume of an extent in the coordinate system of the current scene mode.
    pub fn bounding_sphere(
        &self,
        extent: &Extent,
        minimum_height: f64,
        maximum_height: f64,
    ) -> BoundingSphere {
        match self.mode {
            SceneMode::Scene3D => BoundingSphere::from_extent_3d(
                extent,
                self.ellipsoid(),
                minimum_height,
                maximum_height,
            ),
            SceneMode::ColumbusView | SceneMode::Scene2D => BoundingSphere::from_extent_projected(
                extent,
                &self.projection,
                minimum_height,
                maximum_height,
            ),
        }
    }

    /// The position of the camera as a geodetic coordinate.
    pub fn camera_cartographic(&self) -> Option<Cartographic> {
        self.mode
            .is_projected()
            .then(|| self.projection.unproject(self.camera.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Intersect;

    #[test]
    fn perspective_volume_contains_target() {
        let mut camera = Camera::default();
        camera.look_at(DVec3::new(0.0, 0.0, 100.0), DVec3::ZERO, DVec3::Y);

        let volume = camera.culling_volume();
        let target = BoundingSphere::new(DVec3::ZERO, 1.0);
        let behind = BoundingSphere::new(DVec3::new(0.0, 0.0, 200.0), 1.0);
        let aside = BoundingSphere::new(DVec3::new(500.0, 0.0, 0.0), 1.0);

        assert_eq!(volume.visibility(&target), Intersect::Inside);
        assert_eq!(volume.visibility(&behind), Intersect::Outside);
        assert_eq!(volume.visibility(&aside), Intersect::Outside);
    }

    #[test]
    fn viewing_an_extent_in_2d_uses_an_orthographic_frustum() {
        let mut frame_state = FrameState::default();
        let extent = Extent::new(0.0001, 0.0001, 0.0030, 0.0030);
        frame_state.view_extent(&extent, SceneMode::Scene2D);

        let (min, max) = frame_state.camera.orthographic_bounds().unwrap();
        let (extent_min, extent_max) = projected_bounds(&extent, &frame_state.projection);

        assert!(min.x <= extent_min.x + 1e-6 && min.y <= extent_min.y + 1e-6);
        assert!(max.x >= extent_max.x - 1e-6 && max.y >= extent_max.y - 1e-6);

        frame_state.view_extent(&extent, SceneMode::ColumbusView);
        assert_eq!(frame_state.camera.frustum, Frustum::perspective(800.0 / 600.0));
    }
}
