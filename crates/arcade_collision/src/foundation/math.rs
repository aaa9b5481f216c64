//! Math utilities and types
//!
//! Provides the nalgebra aliases and the TRS transform used by collision
//! shapes, projectiles and picking.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// 3D integer vector, used for grid cell coordinates
pub type IVec3 = Vector3<i32>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform from position, euler rotation in degrees, and scale
    ///
    /// This is the layout spawn configs are authored in.
    pub fn from_degrees(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation: utils::quat_from_degrees(rotation_degrees),
            scale,
        }
    }

    /// Convert to a transformation matrix (translate * rotate * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point.component_mul(&self.scale)
    }

    /// Direction the transform faces; projectiles and ships travel along local -Z
    pub fn forward(&self) -> Vec3 {
        self.rotation * constants::FORWARD
    }
}

/// Math constants
pub mod constants {
    use super::Vec3;

    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Local forward axis of models in the arcade (-Z)
    pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

    /// Threshold under which lengths and direction components count as zero
    pub const EPSILON: f32 = 1e-6;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Mat4, Quat, Vec3, Vec4};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Build a rotation from euler angles in degrees, applied X then Y then Z
    pub fn quat_from_degrees(degrees: Vec3) -> Quat {
        Quat::from_euler_angles(
            deg_to_rad(degrees.x),
            deg_to_rad(degrees.y),
            deg_to_rad(degrees.z),
        )
    }

    /// Rotation taking `from` onto `to`; both must be normalized
    ///
    /// Opposite vectors rotate half a turn around any axis perpendicular to `from`.
    pub fn rotation_between(from: &Vec3, to: &Vec3) -> Quat {
        Quat::rotation_between(from, to).unwrap_or_else(|| {
            let fallback = if from.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
            let axis = nalgebra::Unit::new_normalize(from.cross(&fallback));
            Quat::from_axis_angle(&axis, constants::PI)
        })
    }

    /// Transform a point by a homogeneous matrix, dividing through by w
    pub fn transform_point(matrix: &Mat4, point: &Vec3) -> Vec3 {
        let p = matrix * Vec4::new(point.x, point.y, point.z, 1.0);
        if p.w.abs() > constants::EPSILON && (p.w - 1.0).abs() > constants::EPSILON {
            p.xyz() / p.w
        } else {
            p.xyz()
        }
    }

    /// Transform a direction by a homogeneous matrix (w = 0)
    pub fn transform_vector(matrix: &Mat4, vector: &Vec3) -> Vec3 {
        (matrix * Vec4::new(vector.x, vector.y, vector.z, 0.0)).xyz()
    }

    /// Translation column of a model matrix
    pub fn translation_of(matrix: &Mat4) -> Vec3 {
        Vec3::new(matrix.m14, matrix.m24, matrix.m34)
    }

    /// Normalize `v`, returning `None` for zero-length or non-finite input
    pub fn try_normalize(v: &Vec3) -> Option<Vec3> {
        let length = v.magnitude();
        if length > constants::EPSILON && length.is_finite() {
            Some(v / length)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_matches_point_transform() {
        let transform = Transform::from_degrees(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 90.0, 0.0),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let point = Vec3::new(1.0, 0.0, 0.0);

        let by_matrix = utils::transform_point(&transform.to_matrix(), &point);
        let direct = transform.transform_point(point);

        assert_relative_eq!(by_matrix, direct, epsilon = 1e-5);
        assert_relative_eq!(direct, Vec3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_between_opposite_vectors() {
        let from = Vec3::new(0.0, 0.0, -1.0);
        let to = Vec3::new(0.0, 0.0, 1.0);
        let rotation = utils::rotation_between(&from, &to);
        assert_relative_eq!(rotation * from, to, epsilon = 1e-5);
    }

    #[test]
    fn test_try_normalize_rejects_zero() {
        assert!(utils::try_normalize(&Vec3::zeros()).is_none());
        let n = utils::try_normalize(&Vec3::new(0.0, 3.0, 4.0)).unwrap();
        assert_relative_eq!(n.magnitude(), 1.0);
    }
}
