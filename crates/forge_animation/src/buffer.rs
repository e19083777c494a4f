use glam::Mat4;

/// CPU-side copy of the skinning matrices handed to the renderer.
///
/// The renderer compares [`version`](Self::version) against the last uploaded
/// version and re-uploads [`as_bytes`](Self::as_bytes) when it changed.
/// Matrices are column-major, as WGSL/GLSL `mat4x4` expect.
#[derive(Debug, Clone)]
pub struct BoneMatrixBuffer {
    label: String,
    matrices: Vec<Mat4>,
    version: u64,
}

impl BoneMatrixBuffer {
    #[must_use]
    pub fn new(label: &str, bone_count: usize) -> Self {
        Self {
            label: label.to_string(),
            matrices: vec![Mat4::IDENTITY; bone_count],
            version: 0,
        }
    }

    /// Overwrites the matrices and bumps the version.
    pub fn write(&mut self, matrices: &[Mat4]) {
        self.matrices.clear();
        self.matrices.extend_from_slice(matrices);
        self.version += 1;
    }

    #[inline]
    #[must_use]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}
