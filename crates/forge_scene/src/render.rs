//! Render Boundary
//!
//! The scene graph and the actors talk to the renderer only through the
//! [`RenderDevice`] trait:
//!
//! ```text
//! SceneGraph::render ──► RenderDevice::request_rendering(RenderRequest)
//! ActorRegistry::dispatch ──► activate_shader / bind_bone_buffer /
//!                             activate_material / draw_indexed
//! ```
//!
//! [`RenderContext`] is the concrete, backend-free implementation. It is an
//! explicit context object created once and passed to whoever needs it; it
//! records the issued commands so that a backend (or a test) can replay them.

use std::ops::Range;

use glam::{Mat4, Quat, Vec3};
use log::{debug, trace};

use forge_animation::BoneMatrixBuffer;
use forge_core::camera::{Camera, Frustum};
use forge_core::settings::RenderSettings;

use crate::actor::ActorKey;

/// Phase of the frame; each pass has its own shader and target configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderPass {
    Shadow,
    #[default]
    Geometry,
    Lighting,
    Forward,
}

/// Rasterization mode requested by a Geometry node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visualization {
    #[default]
    Fill,
    Wireframe,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// One visible Geometry node, emitted during [`crate::SceneGraph::render`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub actor: ActorKey,
    pub rotation: Quat,
    pub position: Vec3,
    pub scale: Vec3,
    pub pass: RenderPass,
    pub visualization: Visualization,
}

impl RenderRequest {
    /// Model matrix `T * R * S`.
    #[inline]
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Everything the scene core needs from a renderer.
pub trait RenderDevice {
    fn active_pass(&self) -> RenderPass;

    /// Frustum used for visibility tests; `None` disables culling.
    fn active_frustum(&self) -> Option<&Frustum>;

    fn request_rendering(&mut self, request: RenderRequest);

    fn set_model_transform(&mut self, model: Mat4);

    fn activate_shader(&mut self, shader: ShaderId);

    /// Binding point of the bone-matrix buffer in `shader`, if it declares one.
    fn bone_binding_point(&self, shader: ShaderId) -> Option<u32>;

    fn bind_bone_buffer(&mut self, binding: u32, buffer: &BoneMatrixBuffer);

    fn activate_material(&mut self, material: MaterialId);

    fn draw_indexed(&mut self, indices: Range<u32>);
}

// ============================================================================
// RenderContext
// ============================================================================

/// A command recorded by [`RenderContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetModelTransform(Mat4),
    ActivateShader(ShaderId),
    BindBoneBuffer {
        binding: u32,
        label: String,
        version: u64,
        bone_count: usize,
    },
    ActivateMaterial(MaterialId),
    DrawIndexed {
        pass: RenderPass,
        indices: Range<u32>,
    },
}

#[derive(Debug, Clone)]
struct ShaderEntry {
    name: String,
    bone_binding: Option<u32>,
}

#[derive(Debug, Default)]
pub struct RenderContext {
    pub settings: RenderSettings,
    pass: RenderPass,
    camera: Option<Camera>,
    shaders: Vec<ShaderEntry>,
    requests: Vec<RenderRequest>,
    commands: Vec<DrawCommand>,
}

impl RenderContext {
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Registers a shader program; `bone_binding` is the binding point of its
    /// bone-matrix buffer, if the shader skins vertices.
    pub fn register_shader(&mut self, name: &str, bone_binding: Option<u32>) -> ShaderId {
        let id = ShaderId(self.shaders.len() as u32);
        self.shaders.push(ShaderEntry {
            name: name.to_string(),
            bone_binding,
        });
        debug!("Registered shader '{name}' as {id:?} (bone binding: {bone_binding:?})");
        id
    }

    #[must_use]
    pub fn shader_name(&self, shader: ShaderId) -> Option<&str> {
        self.shaders.get(shader.0 as usize).map(|s| s.name.as_str())
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn set_active_pass(&mut self, pass: RenderPass) {
        trace!("Render pass: {pass:?}");
        self.pass = pass;
    }

    #[inline]
    #[must_use]
    pub fn requests(&self) -> &[RenderRequest] {
        &self.requests
    }

    /// Hands the queued requests to the caller, leaving the queue empty.
    pub fn take_requests(&mut self) -> Vec<RenderRequest> {
        std::mem::take(&mut self.requests)
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of recorded draw calls.
    #[must_use]
    pub fn draw_call_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawIndexed { .. }))
            .count()
    }
}

impl RenderDevice for RenderContext {
    fn active_pass(&self) -> RenderPass {
        self.pass
    }

    fn active_frustum(&self) -> Option<&Frustum> {
        if !self.settings.frustum_culling {
            return None;
        }
        self.camera.as_ref().map(Camera::frustum)
    }

    fn request_rendering(&mut self, request: RenderRequest) {
        self.requests.push(request);
    }

    fn set_model_transform(&mut self, model: Mat4) {
        self.commands.push(DrawCommand::SetModelTransform(model));
    }

    fn activate_shader(&mut self, shader: ShaderId) {
        self.commands.push(DrawCommand::ActivateShader(shader));
    }

    fn bone_binding_point(&self, shader: ShaderId) -> Option<u32> {
        self.shaders.get(shader.0 as usize)?.bone_binding
    }

    fn bind_bone_buffer(&mut self, binding: u32, buffer: &BoneMatrixBuffer) {
        self.commands.push(DrawCommand::BindBoneBuffer {
            binding,
            label: buffer.label().to_string(),
            version: buffer.version(),
            bone_count: buffer.len(),
        });
    }

    fn activate_material(&mut self, material: MaterialId) {
        self.commands.push(DrawCommand::ActivateMaterial(material));
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        self.commands.push(DrawCommand::DrawIndexed {
            pass: self.pass,
            indices,
        });
    }
}
