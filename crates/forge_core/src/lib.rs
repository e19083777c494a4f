//! Foundational types shared by the Forge crates: error handling, bounding
//! volumes, the camera and its view frustum, the frame clock and settings.

pub mod bounds;
pub mod camera;
pub mod errors;
pub mod settings;
pub mod time;

pub use bounds::{BoundingBox, BoundingSphere, BoundingVolume};
pub use camera::{Camera, Frustum, ProjectionType};
pub use errors::{ForgeError, Result};
pub use settings::{ControllerSettings, FrameSettings, RenderSettings};
pub use time::{FpsCounter, FrameClock};
