//! Engine Settings
//!
//! Plain configuration structs, built with struct-update syntax:
//!
//! ```rust,ignore
//! use forge_core::settings::{FrameSettings, RenderSettings};
//!
//! let frame = FrameSettings {
//!     target_fps: 30.0,
//!     ..Default::default()
//! };
//! let render = RenderSettings {
//!     frustum_culling: false,
//! };
//! ```

/// Frame-rate normalization settings consumed by [`crate::time::FrameClock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    /// Frame rate at which one per-frame delta corresponds to `fps_scale == 1`.
    pub target_fps: f32,
    /// Upper bound for the fps scale of a single frame. Long stalls (debugger,
    /// window drag) would otherwise integrate many frames of motion at once.
    pub max_fps_scale: Option<f32>,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_fps_scale: Some(4.0),
        }
    }
}

/// Settings for the scene-graph render traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// When disabled, every Geometry node passes the visibility test.
    pub frustum_culling: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frustum_culling: true,
        }
    }
}

/// Settings for a skeletal animation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Label given to the bone-matrix buffer handed to the renderer.
    pub bone_buffer_label: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            bone_buffer_label: "BoneMatrices".to_string(),
        }
    }
}
