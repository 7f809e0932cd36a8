//! Math utilities and types
//!
//! Provides the fundamental math types for the 2D scene transforms. All
//! matrices use nalgebra's column-vector convention: `m * p` applies `m` to
//! `p`, so `a * b` applies `b` first.

pub use nalgebra::{Matrix4, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Point2};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Linear interpolation between two points
    pub fn lerp_point(a: Point2, b: Point2, t: f32) -> Point2 {
        Point2::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t))
    }
}

/// Extension trait for Mat4 with the planar transforms used by the scene
pub trait Mat4Ext {
    /// Translation in the XY plane
    fn translation_2d(x: f32, y: f32) -> Mat4;

    /// Non-uniform scale in the XY plane (Z untouched)
    fn scaling_2d(x: f32, y: f32) -> Mat4;

    /// Counter-clockwise rotation around the Z axis, in radians
    fn rotation_z(radians: f32) -> Mat4;

    /// Transform a planar point (z = 0, w = 1)
    fn transform_point_2d(&self, point: Point2) -> Point2;
}

impl Mat4Ext for Mat4 {
    fn translation_2d(x: f32, y: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, y, 0.0))
    }

    fn scaling_2d(x: f32, y: f32) -> Mat4 {
        Mat4::new_nonuniform_scaling(&Vec3::new(x, y, 1.0))
    }

    fn rotation_z(radians: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), radians)
    }

    fn transform_point_2d(&self, point: Point2) -> Point2 {
        let p = self.transform_point(&nalgebra::Point3::new(point.x, point.y, 0.0));
        Point2::new(p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_composition_applies_right_operand_first() {
        let scale = Mat4::scaling_2d(2.0, 2.0);
        let translate = Mat4::translation_2d(10.0, 0.0);

        let p = (translate * scale).transform_point_2d(Point2::new(1.0, 1.0));
        assert_relative_eq!(p, Point2::new(12.0, 2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_is_counter_clockwise() {
        let rotation = Mat4::rotation_z(utils::deg_to_rad(90.0));
        let p = rotation.transform_point_2d(Point2::new(1.0, 0.0));
        assert_relative_eq!(p, Point2::new(0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_lerp_point() {
        let p = utils::lerp_point(Point2::new(0.0, 0.0), Point2::new(10.0, -4.0), 0.25);
        assert_relative_eq!(p, Point2::new(2.5, -1.0), epsilon = 1e-6);
    }
}
