//! Forge: skeletal animation and scene-graph core of a real-time renderer.
//!
//! This umbrella crate re-exports the workspace crates and adds the
//! [`Engine`] frame loop on top of them:
//!
//! - [`forge_core`]: errors, bounding volumes, camera and frustum, clock, settings
//! - [`forge_animation`]: skeletons, clips, playback and skinning
//! - [`forge_scene`]: scene graph, actors and the render boundary

pub mod engine;

pub use forge_animation;
pub use forge_core;
pub use forge_scene;
pub use glam;

pub use engine::{Engine, FrameStats};

pub use forge_animation::{
    AnimationClip, AnimationInstance, AnimationKey, BoneKeyframeTrack, BoneMatrixBuffer, ClipId,
    InterpolationMode, JointSnapshot, KeyframeTrack, LocalPose, LoopMode,
    SkeletalAnimationController, SkeletonBuilder, SkeletonHierarchy,
};
pub use forge_core::{
    BoundingBox, BoundingSphere, BoundingVolume, Camera, ControllerSettings, ForgeError,
    FrameClock, FrameSettings, Frustum, RenderSettings, Result,
};
pub use forge_scene::{
    Actor, ActorKey, ActorRegistry, ControllerKey, DrawCommand, GeometryNode, MaterialId, NodeKey,
    PassShaders, RenderContext, RenderDevice, RenderGroup, RenderPass, RenderRequest, SceneGraph,
    ShaderId, SkinnedMeshData, StaticActor, TransformationNode, Visualization,
};
