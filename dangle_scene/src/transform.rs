use glam::{Mat4, Quat, Vec3};

/// Local transform of a scene node.
///
/// Position, rotation and scale, composed Scale → Rotate → Translate.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Transform3D {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Converts to a `glam::Mat4` (Scale → Rotate → Translate)
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Converts a `Mat4` back into a `Transform3D`
    /// (approximation for non-uniform scaling with shear)
    pub fn from_mat4(mat: Mat4) -> Self {
        let (scale, rotation, position) = mat.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat4_roundtrip() {
        let t = Transform3D {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };
        let back = Transform3D::from_mat4(t.to_mat4());
        assert!(back.position.abs_diff_eq(t.position, 1e-5));
        assert!(back.scale.abs_diff_eq(t.scale, 1e-5));
        assert!(back.to_mat4().abs_diff_eq(t.to_mat4(), 1e-5));
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform3D::default(), Transform3D::IDENTITY);
        assert_eq!(Transform3D::default().to_mat4(), Mat4::IDENTITY);
    }
}
