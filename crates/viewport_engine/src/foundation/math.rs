//! Math utilities and types
//!
//! Provides the fundamental math types used by the viewport kernel. All matrices
//! follow the OpenGL clip-space convention (right-handed view space, depth in
//! [-1, 1]) since the viewport presents through a GL-style pipeline.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a right-handed perspective projection with GL depth range.
    ///
    /// `fov_y` is the vertical field of view in radians.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a view matrix for an eye at `position` rotated by `orientation`.
    ///
    /// The orientation rotates the canonical view basis (looking down -Z, +Y up)
    /// into world space, so the view matrix is the inverse of the eye's world
    /// transform.
    fn view_from(position: Vec3, orientation: &Quat) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// World-space translation stored in the last column
    fn translation_part(&self) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn view_from(position: Vec3, orientation: &Quat) -> Mat4 {
        let rotation = orientation.inverse().to_homogeneous();
        rotation * Mat4::new_translation(&(-position))
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&eye.into(), &target.into(), &up)
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_from_identity_orientation_translates_eye_to_origin() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let view = Mat4::view_from(eye, &Quat::identity());
        let moved = view.transform_point(&eye.into());
        assert_relative_eq!(moved.coords, Vec3::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn test_translation_part() {
        let m = Mat4::new_translation(&Vec3::new(4.0, -1.0, 7.5));
        assert_relative_eq!(m.translation_part(), Vec3::new(4.0, -1.0, 7.5));
    }

    #[test]
    fn test_perspective_maps_near_plane_to_minus_one() {
        let p = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 1.0, 100.0);
        let clip = p * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert_relative_eq!(clip.z / clip.w, -1.0, epsilon = 1e-5);
    }
}
