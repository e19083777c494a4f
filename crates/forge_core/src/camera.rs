use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};

use crate::bounds::{BoundingBox, BoundingSphere, BoundingVolume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// Virtual camera: projection parameters plus the cached view/projection
/// matrices and the view frustum derived from them.
#[derive(Debug, Clone)]
pub struct Camera {
    pub projection_type: ProjectionType,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half height of the orthographic view volume.
    pub ortho_size: f32,

    world_matrix: Affine3A,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// `fov` is given in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::with_projection(ProjectionType::Perspective, aspect, near, far);
        cam.fov = fov.to_radians();
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::with_projection(ProjectionType::Orthographic, aspect, near, far);
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    fn with_projection(projection_type: ProjectionType, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection_type,
            fov: 60.0_f32.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        }
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            // glam's `_rh` projections map depth to [0, 1]
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };

        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    /// Places the camera at `eye` looking towards `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(eye, target, up);
        let world = Affine3A::from_mat4(view.inverse());
        self.update_view_projection(&world);
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// Six inward-facing planes, stored as `(normal, d)` with `dot(n, p) + d >= 0`
/// for points inside.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a [0, 1] depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    #[inline]
    fn signed_distance(plane: Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| Self::signed_distance(*plane, center) >= -radius)
    }

    /// World-space AABB test using the positive vertex of each plane.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &BoundingBox) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.truncate();
            let p = Vec3::new(
                if n.x < 0.0 { aabb.min.x } else { aabb.max.x },
                if n.y < 0.0 { aabb.min.y } else { aabb.max.y },
                if n.z < 0.0 { aabb.min.z } else { aabb.max.z },
            );
            Self::signed_distance(*plane, p) >= 0.0
        })
    }

    /// Tests a local-space bounding volume placed with `rotation`, `translation`
    /// and `scale`. `Unknown` volumes are always visible.
    #[must_use]
    pub fn visible(
        &self,
        volume: &BoundingVolume,
        rotation: Quat,
        translation: Vec3,
        scale: Vec3,
    ) -> bool {
        match volume {
            BoundingVolume::Unknown => true,
            BoundingVolume::Sphere(sphere) => {
                self.sphere_visible(sphere, rotation, translation, scale)
            }
            BoundingVolume::Aabb(aabb) => self.aabb_visible(aabb, rotation, translation, scale),
        }
    }

    fn sphere_visible(
        &self,
        sphere: &BoundingSphere,
        rotation: Quat,
        translation: Vec3,
        scale: Vec3,
    ) -> bool {
        let center = rotation * (scale * sphere.center) + translation;
        let radius = sphere.radius * scale.abs().max_element();
        self.intersects_sphere(center, radius)
    }

    fn aabb_visible(&self, aabb: &BoundingBox, rotation: Quat, translation: Vec3, scale: Vec3) -> bool {
        let placement = Affine3A::from_scale_rotation_translation(scale, rotation, translation);
        self.intersects_aabb(&aabb.transform(&placement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_looking_down_negative_z() -> Camera {
        let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        cam.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        cam
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let cam = camera_looking_down_negative_z();
        assert!(cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn sphere_behind_is_culled() {
        let cam = camera_looking_down_negative_z();
        assert!(!cam.frustum().intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn unknown_volume_always_visible() {
        let cam = camera_looking_down_negative_z();
        assert!(cam.frustum().visible(
            &BoundingVolume::Unknown,
            Quat::IDENTITY,
            Vec3::new(0.0, 0.0, 500.0),
            Vec3::ONE,
        ));
    }
}
