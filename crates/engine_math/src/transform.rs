//! Local transform component.
//!
//! [`Transform`] stores position, rotation and scale relative to the parent
//! entity. Rotation is kept as Euler angles in degrees, applied X then Y then
//! Z. No matrix is embedded: world matrices are derived and cached by the
//! hierarchy manager.

use engine_component::{Component, ComponentKind};
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A local transform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Transform {
    /// Offset from the parent origin.
    pub position: Vec3,
    /// Euler angles in degrees around X, Y and Z.
    pub rotation: Vec3,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    /// Create a transform with the given position and identity rotation/scale.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Replace the rotation (Euler degrees).
    #[must_use]
    pub fn with_rotation(mut self, degrees: Vec3) -> Self {
        self.rotation = degrees;
        self
    }

    /// Replace the scale.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// The rotation as a quaternion.
    #[must_use]
    pub fn rotation_quat(&self) -> Quat {
        let radians = self.rotation * (std::f32::consts::PI / 180.0);
        Quat::from_euler(EulerRot::XYZ, radians.x, radians.y, radians.z)
    }

    /// The local matrix, composed as translate · rotX · rotY · rotZ · scale.
    ///
    /// The order is fixed; changing it changes every derived world matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        let radians = self.rotation * (std::f32::consts::PI / 180.0);
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(radians.x)
            * Mat4::from_rotation_y(radians.y)
            * Mat4::from_rotation_z(radians.z)
            * Mat4::from_scale(self.scale)
    }

    /// Decompose an affine matrix without shear back into a transform.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            position,
            rotation: Vec3::new(x, y, z) * (180.0 / std::f32::consts::PI),
            scale,
        }
    }

    /// Translate the transform by the given offset.
    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    /// Apply a uniform scale factor.
    #[must_use]
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale *= factor;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn kind() -> ComponentKind {
        ComponentKind::Transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn test_identity_matrix() {
        assert_eq!(Transform::IDENTITY.to_matrix(), Mat4::IDENTITY);
        assert_eq!(Transform::default(), Transform::IDENTITY);
    }

    #[test]
    fn test_translation_only() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let p = t.to_matrix().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_scale_applies_before_translation() {
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0)).with_scale(Vec3::splat(2.0));
        let p = t.to_matrix().transform_point3(Vec3::X);
        assert!(approx(p, Vec3::new(12.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rotation_order_is_x_then_y_then_z() {
        let t = Transform::IDENTITY.with_rotation(Vec3::new(90.0, 90.0, 0.0));
        let expected = Mat4::from_rotation_x(90f32.to_radians()) * Mat4::from_rotation_y(90f32.to_radians());
        assert!(t.to_matrix().abs_diff_eq(expected, 1e-5));

        let swapped = Mat4::from_rotation_y(90f32.to_radians()) * Mat4::from_rotation_x(90f32.to_radians());
        assert!(!t.to_matrix().abs_diff_eq(swapped, 1e-3));
    }

    #[test]
    fn test_quat_matches_matrix_rotation() {
        let t = Transform::IDENTITY.with_rotation(Vec3::new(30.0, 45.0, 60.0));
        let from_quat = Mat4::from_quat(t.rotation_quat());
        assert!(t.to_matrix().abs_diff_eq(from_quat, 1e-5));
    }

    #[test]
    fn test_from_matrix_recovers_components() {
        let t = Transform::from_position(Vec3::new(-3.0, 4.0, 0.5))
            .with_rotation(Vec3::new(0.0, 30.0, 0.0))
            .with_scale(Vec3::new(1.0, 2.0, 3.0));
        let back = Transform::from_matrix(&t.to_matrix());
        assert!(approx(back.position, t.position));
        assert!(approx(back.rotation, t.rotation));
        assert!(approx(back.scale, t.scale));
    }

    #[test]
    fn test_json_shape() {
        let t = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "position": [1.0, 0.0, 0.0],
                "rotation": [0.0, 0.0, 0.0],
                "scale": [1.0, 1.0, 1.0],
            })
        );
        let partial: Transform = serde_json::from_value(serde_json::json!({"position": [2.0, 0.0, 0.0]})).unwrap();
        assert_eq!(partial.scale, Vec3::ONE);
    }
}
