//! Skeletal Animation Controller
//!
//! Owns the runtime side of one skeleton:
//! - the clips available to it (shared, read-only)
//! - an arena of [`AnimationInstance`]s addressed by [`AnimationKey`]
//! - the per-bone local poses, world matrices and skinning matrices
//! - the [`BoneMatrixBuffer`] handed to the renderer
//!
//! # Per-frame flow
//!
//! ```text
//! update(fps_scale)            advance every live instance
//! apply_animation(key, true)   sample -> propagate root-to-leaf -> upload
//! ```
//!
//! Destroyed instances leave stale keys behind; every lookup through a stale
//! key returns `None`, and `apply_animation` falls back to the bind pose.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};
use slotmap::SlotMap;

use forge_core::errors::{ForgeError, Result};
use forge_core::settings::ControllerSettings;

use crate::buffer::BoneMatrixBuffer;
use crate::clip::{AnimationClip, ClipId};
use crate::instance::{AnimationInstance, AnimationKey, LoopMode};
use crate::pose::{JointSnapshot, LocalPose};
use crate::skeleton::SkeletonHierarchy;

pub struct SkeletalAnimationController {
    skeleton: Arc<SkeletonHierarchy>,
    clips: Vec<Arc<AnimationClip>>,
    instances: SlotMap<AnimationKey, AnimationInstance>,

    // === Runtime pose, indexed by bone id ===
    local_poses: Vec<LocalPose>,
    world_matrices: Vec<Mat4>,
    skinning_matrices: Vec<Mat4>,

    bone_buffer: BoneMatrixBuffer,
}

impl SkeletalAnimationController {
    pub fn new(skeleton: Arc<SkeletonHierarchy>) -> Result<Self> {
        Self::with_settings(skeleton, &ControllerSettings::default())
    }

    pub fn with_settings(
        skeleton: Arc<SkeletonHierarchy>,
        settings: &ControllerSettings,
    ) -> Result<Self> {
        if skeleton.is_empty() {
            return Err(ForgeError::MissingReference(format!(
                "skeleton '{}' has no bones",
                skeleton.name()
            )));
        }
        skeleton.root_bone()?;

        let bone_count = skeleton.len();
        let mut controller = Self {
            clips: Vec::new(),
            instances: SlotMap::with_key(),
            local_poses: vec![LocalPose::IDENTITY; bone_count],
            world_matrices: vec![Mat4::IDENTITY; bone_count],
            skinning_matrices: vec![Mat4::IDENTITY; bone_count],
            bone_buffer: BoneMatrixBuffer::new(&settings.bone_buffer_label, bone_count),
            skeleton,
        };
        controller.apply_bind_pose();

        debug!(
            "SkeletalAnimationController: initialized for skeleton '{}' ({bone_count} bones)",
            controller.skeleton.name()
        );
        Ok(controller)
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<SkeletonHierarchy> {
        &self.skeleton
    }

    // ========================================================================
    // Clips
    // ========================================================================

    pub fn add_clip(&mut self, clip: Arc<AnimationClip>) -> ClipId {
        if let Some(id) = clip.skeleton_id()
            && id != self.skeleton.id()
        {
            warn!(
                "AnimationClip '{}' was resolved against a different skeleton than '{}'",
                clip.name,
                self.skeleton.name()
            );
        }

        let bone_count = self.skeleton.len();
        let foreign = clip.tracks().filter(|(id, _)| *id >= bone_count).count();
        if foreign > 0 {
            warn!(
                "AnimationClip '{}': {foreign} track(s) address bones outside skeleton '{}' and are ignored",
                clip.name,
                self.skeleton.name()
            );
        }

        self.clips.push(clip);
        self.clips.len() - 1
    }

    pub fn clip(&self, id: ClipId) -> Result<&Arc<AnimationClip>> {
        self.clips
            .get(id)
            .ok_or_else(|| ForgeError::out_of_bounds("animation clip", id))
    }

    #[inline]
    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Starts a non-looping instance of `clip_id` at `start_time`.
    pub fn create_animation(
        &mut self,
        clip_id: ClipId,
        speed: f32,
        start_time: f32,
    ) -> Result<AnimationKey> {
        self.create_animation_with_mode(clip_id, speed, start_time, LoopMode::Once)
    }

    pub fn create_looping_animation(
        &mut self,
        clip_id: ClipId,
        speed: f32,
        start_time: f32,
    ) -> Result<AnimationKey> {
        self.create_animation_with_mode(clip_id, speed, start_time, LoopMode::Loop)
    }

    pub fn create_animation_with_mode(
        &mut self,
        clip_id: ClipId,
        speed: f32,
        start_time: f32,
        loop_mode: LoopMode,
    ) -> Result<AnimationKey> {
        let duration = self.clip(clip_id)?.duration;
        let instance = AnimationInstance::new(
            clip_id,
            duration,
            speed,
            start_time,
            loop_mode,
            self.skeleton.len(),
        );
        let key = self.instances.insert(instance);
        debug!("Created animation {key:?} for clip {clip_id} (speed {speed}, start {start_time})");
        Ok(key)
    }

    /// Releases the instance. The key is stale afterwards.
    pub fn destroy_animation(&mut self, key: AnimationKey) -> Option<AnimationInstance> {
        let removed = self.instances.remove(key);
        if removed.is_some() {
            debug!("Destroyed animation {key:?}");
        }
        removed
    }

    #[inline]
    #[must_use]
    pub fn animation(&self, key: AnimationKey) -> Option<&AnimationInstance> {
        self.instances.get(key)
    }

    #[inline]
    pub fn animation_mut(&mut self, key: AnimationKey) -> Option<&mut AnimationInstance> {
        self.instances.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn active_animation_count(&self) -> usize {
        self.instances.len()
    }

    pub fn pause_animation(&mut self, key: AnimationKey) -> bool {
        self.set_paused(key, true)
    }

    pub fn resume_animation(&mut self, key: AnimationKey) -> bool {
        self.set_paused(key, false)
    }

    fn set_paused(&mut self, key: AnimationKey, paused: bool) -> bool {
        match self.instances.get_mut(key) {
            Some(instance) => {
                instance.paused = paused;
                true
            }
            None => false,
        }
    }

    /// Advances every unfinished instance by `fps_scale * speed`.
    pub fn update(&mut self, fps_scale: f32) {
        if !fps_scale.is_finite() {
            warn!("SkeletalAnimationController: ignoring non-finite fps scale {fps_scale}");
            return;
        }
        for instance in self.instances.values_mut() {
            instance.advance(fps_scale);
        }
    }

    // ========================================================================
    // Pose evaluation
    // ========================================================================

    /// Samples `key`'s clip at its current time and recomputes all skinning
    /// matrices. `None` (or a stale key) produces the bind pose, where every
    /// skinning matrix is the identity.
    pub fn apply_animation(&mut self, key: Option<AnimationKey>, update_gpu_buffer: bool) {
        let instance = match key {
            Some(key) => {
                let instance = self.instances.get_mut(key);
                if instance.is_none() {
                    warn!("apply_animation: stale animation key {key:?}, using bind pose");
                }
                instance
            }
            None => None,
        };

        match instance {
            Some(instance) => {
                let clip = &self.clips[instance.clip_id()];
                let time = instance.time();

                for bone in self.skeleton.bones() {
                    let id = bone.id();
                    self.local_poses[id] = match clip.track(id) {
                        Some(track) => track.sample_with_cursors(
                            time,
                            &mut instance.cursors[id],
                            bone.rest_pose(),
                        ),
                        None => *bone.rest_pose(),
                    };
                }
                self.propagate();
            }
            None => self.apply_bind_pose(),
        }

        if update_gpu_buffer {
            self.bone_buffer.write(&self.skinning_matrices);
        }
    }

    /// Propagates externally computed local poses (IK, procedural adjustments).
    /// Bones without an entry in `poses` use their rest pose.
    pub fn apply_pose(&mut self, poses: &[LocalPose], update_gpu_buffer: bool) {
        if poses.len() != self.skeleton.len() {
            warn!(
                "apply_pose: {} poses for {} bones, missing bones use their rest pose",
                poses.len(),
                self.skeleton.len()
            );
        }

        for bone in self.skeleton.bones() {
            let id = bone.id();
            self.local_poses[id] = poses.get(id).copied().unwrap_or(*bone.rest_pose());
        }
        self.propagate();

        if update_gpu_buffer {
            self.bone_buffer.write(&self.skinning_matrices);
        }
    }

    fn apply_bind_pose(&mut self) {
        for bone in self.skeleton.bones() {
            let id = bone.id();
            self.local_poses[id] = *bone.rest_pose();
            self.world_matrices[id] = bone.inverse_bind_matrix().inverse();
            self.skinning_matrices[id] = Mat4::IDENTITY;
        }
    }

    /// `world = parent_world * local`, `skinning = world * inverse_bind`.
    fn propagate(&mut self) {
        let bones = self.skeleton.bones();
        for &id in self.skeleton.traversal_order() {
            let bone = &bones[id];
            let parent_world = bone
                .parent()
                .map_or(Mat4::IDENTITY, |parent| self.world_matrices[parent]);
            let world = parent_world * self.local_poses[id].to_matrix();
            self.world_matrices[id] = world;
            self.skinning_matrices[id] = world * *bone.inverse_bind_matrix();
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    #[inline]
    #[must_use]
    pub fn world_matrices(&self) -> &[Mat4] {
        &self.world_matrices
    }

    #[inline]
    #[must_use]
    pub fn local_poses(&self) -> &[LocalPose] {
        &self.local_poses
    }

    #[inline]
    #[must_use]
    pub fn bone_buffer(&self) -> &BoneMatrixBuffer {
        &self.bone_buffer
    }

    /// Copies of every joint's current state.
    #[must_use]
    pub fn retrieve_skeleton(&self) -> Vec<JointSnapshot> {
        self.skeleton
            .bones()
            .iter()
            .map(|bone| {
                let id = bone.id();
                JointSnapshot {
                    id,
                    name: bone.name().to_string(),
                    parent: bone.parent(),
                    children: bone.children().to_vec(),
                    inverse_bind_matrix: *bone.inverse_bind_matrix(),
                    local: self.local_poses[id],
                    world_matrix: self.world_matrices[id],
                    skinning_matrix: self.skinning_matrices[id],
                }
            })
            .collect()
    }

    /// Refreshes previously retrieved snapshots in place.
    pub fn update_skeleton_values(&self, snapshots: &mut [JointSnapshot]) {
        for snapshot in snapshots {
            let Some(bone) = self.skeleton.bones().get(snapshot.id) else {
                warn!("update_skeleton_values: unknown joint {}", snapshot.id);
                continue;
            };
            let id = bone.id();
            snapshot.inverse_bind_matrix = *bone.inverse_bind_matrix();
            snapshot.local = self.local_poses[id];
            snapshot.world_matrix = self.world_matrices[id];
            snapshot.skinning_matrix = self.skinning_matrices[id];
        }
    }

    /// CPU skinning of one vertex with up to four influences.
    ///
    /// Weights are renormalized by their sum; a vertex without influences (or
    /// whose bone indices are all out of range) is returned unchanged.
    #[must_use]
    pub fn transform_vertex(&self, position: Vec3, bone_indices: [u32; 4], weights: [f32; 4]) -> Vec3 {
        let p = position.extend(1.0);
        let mut accumulated = Vec4::ZERO;
        let mut total_weight = 0.0;

        for (&index, &weight) in bone_indices.iter().zip(&weights) {
            if weight == 0.0 {
                continue;
            }
            let Some(matrix) = self.skinning_matrices.get(index as usize) else {
                continue;
            };
            accumulated += (*matrix * p) * weight;
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            position
        } else {
            accumulated.truncate() / total_weight
        }
    }
}
