use glam::{Mat4, Quat, Vec3};

/// Bone-local TRS pose, either sampled from a clip or taken from the rest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalPose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// `T * R * S`
    #[inline]
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for LocalPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Read-only copy of one joint's runtime state, exported for consumers that
/// post-process the pose (foot IK, debug drawing, retargeting).
#[derive(Debug, Clone, PartialEq)]
pub struct JointSnapshot {
    pub id: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub inverse_bind_matrix: Mat4,
    pub local: LocalPose,
    pub world_matrix: Mat4,
    pub skinning_matrix: Mat4,
}
