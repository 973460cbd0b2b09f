//! Off-axis stereo projection.
//!
//! Each eye gets an asymmetric frustum shifted by half the eye separation
//! (scaled to the near plane through the focal length) and a view matrix
//! translated sideways along the camera's right vector.

use glam::{Mat4, Vec4};

use crate::camera::Camera;

/// Which half of a stereo pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// -1 for the left eye, +1 for the right.
    #[inline]
    fn side(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoParams {
    pub eye_separation: f32,
    pub focal_length: f32,
    pub fov_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for StereoParams {
    fn default() -> Self {
        Self {
            eye_separation: 0.08,
            focal_length: 0.5,
            fov_degrees: 90.0,
            z_near: 0.1,
            z_far: 256.0,
        }
    }
}

/// Projection and view matrices of one eye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeMatrices {
    pub projection: Mat4,
    pub view: Mat4,
}

impl StereoParams {
    /// Frustum bounds `(left, right, bottom, top)` at the near plane.
    ///
    /// `width` is the full framebuffer width; each eye sees half of it.
    pub fn frustum_bounds(&self, eye: Eye, width: u32, height: u32) -> (f32, f32, f32, f32) {
        let aspect = (width as f32 * 0.5) / height.max(1) as f32;
        let wd2 = self.z_near * (self.fov_degrees.to_radians() / 2.0).tan();
        let ndfl = self.z_near / self.focal_length;
        // The left eye's frustum shifts right and vice versa.
        let shift = -eye.side() * 0.5 * self.eye_separation * ndfl;

        (-aspect * wd2 + shift, aspect * wd2 + shift, -wd2, wd2)
    }

    /// Off-axis projection of one eye, with Y flipped for Vulkan like
    /// [`Perspective::matrix`](crate::camera::Perspective::matrix).
    pub fn projection(&self, eye: Eye, width: u32, height: u32) -> Mat4 {
        let (left, right, bottom, top) = self.frustum_bounds(eye, width, height);
        let mut proj = frustum_rh_zo(left, right, bottom, top, self.z_near, self.z_far);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// `rotation * translate(position ± right * separation / 2)`.
    pub fn view(&self, eye: Eye, camera: &Camera) -> Mat4 {
        let offset = camera.right() * (eye.side() * self.eye_separation / 2.0);
        camera.rotation_matrix() * Mat4::from_translation(camera.position + offset)
    }

    pub fn eye(&self, eye: Eye, camera: &Camera, width: u32, height: u32) -> EyeMatrices {
        EyeMatrices {
            projection: self.projection(eye, width, height),
            view: self.view(eye, camera),
        }
    }
}

/// Right-handed off-axis perspective projection with depth in `[0, 1]`.
///
/// Reduces to [`Mat4::perspective_rh`] when `left == -right` and
/// `bottom == -top`.
pub fn frustum_rh_zo(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            far / (near - far),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_symmetric_frustum_matches_perspective() {
        let fov = 60f32.to_radians();
        let aspect = 1.5;
        let (near, far) = (0.1, 256.0);
        let top = near * (fov / 2.0).tan();
        let right = top * aspect;

        let frustum = frustum_rh_zo(-right, right, -top, top, near, far);
        let perspective = Mat4::perspective_rh(fov, aspect, near, far);
        assert!(frustum.abs_diff_eq(perspective, EPSILON));
    }

    #[test]
    fn test_frustum_bounds_are_mirrored() {
        let params = StereoParams::default();
        let (l0, r0, b0, t0) = params.frustum_bounds(Eye::Left, 1280, 720);
        let (l1, r1, b1, t1) = params.frustum_bounds(Eye::Right, 1280, 720);

        let ndfl = params.z_near / params.focal_length;
        let shift = 0.5 * params.eye_separation * ndfl;
        assert!((l0 - l1 - 2.0 * shift).abs() < EPSILON);
        assert!((r0 - r1 - 2.0 * shift).abs() < EPSILON);
        assert!((l0 + r1).abs() < EPSILON);
        assert_eq!((b0, t0), (b1, t1));
        assert!((t0 - 0.1 * 45f32.to_radians().tan()).abs() < EPSILON);
    }

    #[test]
    fn test_left_eye_bounds_formula() {
        let params = StereoParams::default();
        let (w, h) = (800u32, 600u32);
        let aspect = 400.0 / 600.0;
        let wd2 = 0.1 * (45f32.to_radians()).tan();
        let ndfl = 0.1 / 0.5;

        let (left, right, _, _) = params.frustum_bounds(Eye::Left, w, h);
        assert!((left - (-aspect * wd2 + 0.5 * 0.08 * ndfl)).abs() < EPSILON);
        assert!((right - (aspect * wd2 + 0.5 * 0.08 * ndfl)).abs() < EPSILON);
    }

    #[test]
    fn test_eye_views_offset_along_right_vector() {
        let params = StereoParams::default();
        let camera = Camera::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO);

        let left = params.view(Eye::Left, &camera);
        let right = params.view(Eye::Right, &camera);

        // At rest the right vector is -X.
        let half = params.eye_separation / 2.0;
        let expected_left = Mat4::from_translation(Vec3::new(half, 0.0, -10.0));
        let expected_right = Mat4::from_translation(Vec3::new(-half, 0.0, -10.0));
        assert!(left.abs_diff_eq(expected_left, EPSILON));
        assert!(right.abs_diff_eq(expected_right, EPSILON));
    }

    #[test]
    fn test_projection_flips_y_like_mono_camera() {
        let params = StereoParams::default();
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO);
        camera.update_aspect_ratio(640.0 / 720.0);
        let mono = camera.perspective().matrix();

        for eye in Eye::BOTH {
            let stereo = params.projection(eye, 1280, 720);
            assert!(stereo.y_axis.y < 0.0, "{:?}", eye);
            assert_eq!(stereo.y_axis.y.signum(), mono.y_axis.y.signum());
        }

        // With zero separation each eye is the symmetric mono frustum.
        let centered = StereoParams {
            eye_separation: 0.0,
            ..params
        };
        let mut expected = Mat4::perspective_rh(90f32.to_radians(), 640.0 / 720.0, 0.1, 256.0);
        expected.y_axis.y *= -1.0;
        assert!(centered.projection(Eye::Left, 1280, 720).abs_diff_eq(expected, EPSILON));
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let params = StereoParams::default();
        let projection = params.projection(Eye::Left, 640, 0);
        assert!(projection.is_finite());
    }
}
