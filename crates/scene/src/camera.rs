//! Euler-angle "look-at" camera.
//!
//! Rotation is stored in degrees and applied X, then Y, then Z. The view
//! matrix is `rotation * translation(position)`, so with a zero rotation a
//! camera at `(0, 0, -10)` shifts the scene ten units forward along +Z.

use glam::{Mat4, Vec3};

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_DEGREES: f32 = 60.0;
pub const DEFAULT_Z_NEAR: f32 = 0.1;
pub const DEFAULT_Z_FAR: f32 = 256.0;

/// Perspective parameters, kept so the aspect can be updated on resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_degrees: DEFAULT_FOV_DEGREES,
            aspect: 1.0,
            z_near: DEFAULT_Z_NEAR,
            z_far: DEFAULT_Z_FAR,
        }
    }
}

impl Perspective {
    /// Right-handed, zero-to-one depth projection with Y flipped for Vulkan.
    pub fn matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.z_near,
            self.z_far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Position in world space.
    pub position: Vec3,
    /// Euler rotation in degrees.
    pub rotation: Vec3,
    perspective: Perspective,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            perspective: Perspective::default(),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    pub fn rotate(&mut self, delta_degrees: Vec3) {
        self.rotation += delta_degrees;
    }

    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, z_near: f32, z_far: f32) {
        self.perspective = Perspective {
            fov_degrees,
            aspect,
            z_near,
            z_far,
        };
    }

    /// Keeps the field of view and depth range, replacing only the aspect.
    pub fn update_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.perspective.aspect = aspect;
        }
    }

    #[inline]
    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    /// `Rx * Ry * Rz` built from the Euler angles.
    pub fn rotation_matrix(&self) -> Mat4 {
        let radians = self.rotation * (std::f32::consts::PI / 180.0);
        Mat4::from_rotation_x(radians.x)
            * Mat4::from_rotation_y(radians.y)
            * Mat4::from_rotation_z(radians.z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.rotation_matrix() * Mat4::from_translation(self.position)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.perspective.matrix()
    }

    /// Viewing direction derived from pitch (x) and yaw (y).
    pub fn front(&self) -> Vec3 {
        let rx = self.rotation.x.to_radians();
        let ry = self.rotation.y.to_radians();
        Vec3::new(-rx.cos() * ry.sin(), rx.sin(), rx.cos() * ry.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_default_camera() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::ZERO);
        assert_eq!(camera.rotation, Vec3::ZERO);
        assert_eq!(camera.perspective().fov_degrees, 60.0);
        assert_eq!(camera.perspective().z_far, 256.0);
    }

    #[test]
    fn test_view_matrix_is_translation_without_rotation() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO);
        let view = camera.view_matrix();
        assert!(view.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)), EPSILON));
        let moved = view.transform_point3(Vec3::ZERO);
        assert!((moved.z + 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_view_matrix_applies_rotation_after_translation() {
        let camera = Camera::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0));
        let expected =
            Mat4::from_rotation_y(90f32.to_radians()) * Mat4::from_translation(Vec3::X);
        assert!(camera.view_matrix().abs_diff_eq(expected, EPSILON));
    }

    #[test]
    fn test_translate_and_rotate_accumulate() {
        let mut camera = Camera::default();
        camera.translate(Vec3::new(1.0, 2.0, 3.0));
        camera.translate(Vec3::new(1.0, 0.0, 0.0));
        camera.rotate(Vec3::new(0.0, 45.0, 0.0));
        camera.rotate(Vec3::new(0.0, 45.0, 0.0));
        assert_eq!(camera.position, Vec3::new(2.0, 2.0, 3.0));
        assert_eq!(camera.rotation, Vec3::new(0.0, 90.0, 0.0));
    }

    #[test]
    fn test_projection_flips_y() {
        let mut camera = Camera::default();
        camera.set_perspective(60.0, 16.0 / 9.0, 0.1, 256.0);
        let unflipped = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 256.0);
        let proj = camera.projection_matrix();
        assert!((proj.y_axis.y + unflipped.y_axis.y).abs() < EPSILON);
        assert!((proj.x_axis.x - unflipped.x_axis.x).abs() < EPSILON);
    }

    #[test]
    fn test_update_aspect_ignores_degenerate_values() {
        let mut camera = Camera::default();
        camera.update_aspect_ratio(2.0);
        assert_eq!(camera.perspective().aspect, 2.0);
        camera.update_aspect_ratio(0.0);
        camera.update_aspect_ratio(f32::NAN);
        assert_eq!(camera.perspective().aspect, 2.0);
    }

    #[test]
    fn test_front_and_right_at_rest() {
        let camera = Camera::default();
        assert!(camera.front().abs_diff_eq(Vec3::Z, EPSILON));
        assert!(camera.right().abs_diff_eq(Vec3::NEG_X, EPSILON));
    }
}
