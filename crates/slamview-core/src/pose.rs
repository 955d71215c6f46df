//! Rigid body transforms.

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A rigid transform mapping a local frame into its parent frame.
///
/// Composition follows the usual convention: `(a * b).transform_point(p)`
/// equals `a.transform_point(b.transform_point(p))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Unit rotation.
    pub rotation: Quat,
    /// Translation.
    pub translation: Vec3,
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Creates a pose from a rotation and translation. The rotation is normalized.
    #[must_use]
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
        }
    }

    /// Pure translation.
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation,
        }
    }

    /// Pure rotation.
    #[must_use]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self::new(rotation, Vec3::ZERO)
    }

    /// Builds a pose from a rotation matrix and translation.
    #[must_use]
    pub fn from_rotation_matrix(rotation: Mat3, translation: Vec3) -> Self {
        Self::new(Quat::from_mat3(&rotation), translation)
    }

    /// Builds a pose from a row-major 3x4 `[R | t]` matrix.
    #[must_use]
    pub fn from_row_major_3x4(m: &[f32; 12]) -> Self {
        let rotation = Mat3::from_cols(
            Vec3::new(m[0], m[4], m[8]),
            Vec3::new(m[1], m[5], m[9]),
            Vec3::new(m[2], m[6], m[10]),
        );
        Self::from_rotation_matrix(rotation, Vec3::new(m[3], m[7], m[11]))
    }

    /// Returns the inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Applies the transform to a point.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Applies only the rotation to a direction.
    #[must_use]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Returns the homogeneous matrix of this transform.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Transforms every point from the local frame into the parent frame.
    #[must_use]
    pub fn transform_points(&self, points: &[Vec3]) -> Vec<Vec3> {
        points.iter().map(|&p| self.transform_point(p)).collect()
    }

    /// Returns the relative transform that carries geometry attached to `from`
    /// so that it ends up attached to `to`, i.e. `to * from⁻¹`.
    #[must_use]
    pub fn relative(from: &Self, to: &Self) -> Self {
        *to * from.inverse()
    }

    /// Rigidly carries world-space points from one pose to another in place.
    pub fn carry(points: &mut [Vec3], from: &Self, to: &Self) {
        let delta = Self::relative(from, to);
        for p in points.iter_mut() {
            *p = delta.transform_point(*p);
        }
    }

    /// Returns true when both transforms agree within `epsilon`.
    #[must_use]
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        // q and -q encode the same rotation
        let same_rotation = self.rotation.abs_diff_eq(other.rotation, epsilon)
            || self.rotation.abs_diff_eq(-other.rotation, epsilon);
        same_rotation && self.translation.abs_diff_eq(other.translation, epsilon)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            rotation: (self.rotation * rhs.rotation).normalize(),
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

impl std::ops::Mul<Vec3> for Pose {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        self.transform_point(rhs)
    }
}
