//! Skeletal animation for the Forge engine.
//!
//! - [`SkeletonHierarchy`]: immutable bone tree with bind-pose data
//! - [`AnimationClip`]: per-bone keyframe tracks, shared read-only
//! - [`SkeletalAnimationController`]: playback instances, pose evaluation,
//!   skinning matrices and the bone buffer handed to the renderer
//! - [`clip_io`]: binary clip persistence

pub mod buffer;
pub mod clip;
pub mod clip_io;
pub mod controller;
pub mod instance;
pub mod pose;
pub mod skeleton;
pub mod tracks;
pub mod values;

pub use buffer::BoneMatrixBuffer;
pub use clip::{AnimationClip, ClipId};
pub use clip_io::{load_clips, read_clips, store_clips, write_clips};
pub use controller::SkeletalAnimationController;
pub use instance::{AnimationInstance, AnimationKey, LoopMode};
pub use pose::{JointSnapshot, LocalPose};
pub use skeleton::{Bone, BoneDesc, SkeletonBuilder, SkeletonHierarchy};
pub use tracks::{BoneKeyframeTrack, InterpolationMode, KeyframeCursor, KeyframeTrack, TrackCursors};
pub use values::Interpolatable;
