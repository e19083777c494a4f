//! Actors
//!
//! Renderable objects referenced by Geometry nodes. An actor is either
//! [`Actor::Static`] (plain mesh) or [`Actor::Skeletal`] (mesh deformed by a
//! [`SkeletalAnimationController`]). Both live in an [`ActorRegistry`] that
//! also owns the controllers, so nodes and actors only ever hold keys.
//!
//! # Skeletal actor per render call
//!
//! ```text
//! active instance finished? ── yes ──► destroy instance, clear reference
//!            │
//!            ▼
//! controller.apply_animation(active, upload = true)    (None = bind pose)
//!            │
//!            ▼
//! for each render group: pass shader ─► bone buffer (if bound) ─► material ─► draw
//! ```

use std::ops::Range;

use glam::Vec3;
use log::{debug, trace, warn};
use slotmap::{SlotMap, new_key_type};

use forge_animation::{AnimationKey, ClipId, LoopMode, SkeletalAnimationController};
use forge_core::bounds::BoundingVolume;
use forge_core::errors::{ForgeError, Result};

use crate::render::{MaterialId, RenderDevice, RenderPass, RenderRequest, ShaderId};

new_key_type! {
    pub struct ActorKey;
    pub struct ControllerKey;
}

/// Shader used by a render group in each pass. A pass without a shader skips
/// the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassShaders {
    pub shadow: Option<ShaderId>,
    pub geometry: Option<ShaderId>,
    pub forward: Option<ShaderId>,
}

impl PassShaders {
    /// Same shader in the geometry and forward pass, no shadow shader.
    #[must_use]
    pub fn uniform(shader: ShaderId) -> Self {
        Self {
            shadow: None,
            geometry: Some(shader),
            forward: Some(shader),
        }
    }

    #[must_use]
    pub fn for_pass(&self, pass: RenderPass) -> Option<ShaderId> {
        match pass {
            RenderPass::Shadow => self.shadow,
            RenderPass::Geometry => self.geometry,
            RenderPass::Forward => self.forward,
            RenderPass::Lighting => None,
        }
    }
}

/// Contiguous index range drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGroup {
    pub shaders: PassShaders,
    pub material: MaterialId,
    pub index_range: Range<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticActor {
    pub render_groups: Vec<RenderGroup>,
    pub bounding_volume: BoundingVolume,
}

/// Vertex data of a skinned mesh with up to four bone influences per vertex.
#[derive(Debug, Clone)]
pub struct SkinnedMeshData {
    positions: Vec<Vec3>,
    bone_indices: Vec<[u32; 4]>,
    bone_weights: Vec<[f32; 4]>,
}

impl SkinnedMeshData {
    pub fn new(
        positions: Vec<Vec3>,
        bone_indices: Vec<[u32; 4]>,
        bone_weights: Vec<[f32; 4]>,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(ForgeError::MissingReference(
                "skinned mesh has no vertices".to_string(),
            ));
        }
        if bone_indices.is_empty() || bone_weights.is_empty() {
            return Err(ForgeError::MissingReference(
                "skinned mesh has no bone influences".to_string(),
            ));
        }
        if bone_indices.len() != positions.len() || bone_weights.len() != positions.len() {
            return Err(ForgeError::Structural(format!(
                "skinned mesh has {} vertices but {} bone index and {} bone weight entries",
                positions.len(),
                bone_indices.len(),
                bone_weights.len()
            )));
        }
        Ok(Self {
            positions,
            bone_indices,
            bone_weights,
        })
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn max_bone_index(&self) -> Option<u32> {
        self.bone_indices
            .iter()
            .zip(&self.bone_weights)
            .flat_map(|(indices, weights)| {
                indices
                    .iter()
                    .zip(weights)
                    .filter(|(_, w)| **w != 0.0)
                    .map(|(i, _)| *i)
            })
            .max()
    }
}

#[derive(Debug, Clone)]
pub struct SkeletalActor {
    controller: ControllerKey,
    mesh: SkinnedMeshData,
    pub render_groups: Vec<RenderGroup>,
    pub bounding_volume: BoundingVolume,
    active_animation: Option<AnimationKey>,
    shadow_pass_shader: Option<ShaderId>,
}

impl SkeletalActor {
    #[inline]
    #[must_use]
    pub fn controller(&self) -> ControllerKey {
        self.controller
    }

    #[inline]
    #[must_use]
    pub fn mesh(&self) -> &SkinnedMeshData {
        &self.mesh
    }

    #[inline]
    #[must_use]
    pub fn active_animation(&self) -> Option<AnimationKey> {
        self.active_animation
    }

    /// Replaces the shadow shader of every group that casts shadows. Groups
    /// without a shadow shader stay out of the shadow pass.
    pub fn set_shadow_pass_shader(&mut self, shader: Option<ShaderId>) {
        self.shadow_pass_shader = shader;
    }

    #[inline]
    #[must_use]
    pub fn shadow_pass_shader(&self) -> Option<ShaderId> {
        self.shadow_pass_shader
    }

    /// CPU-skinned position of vertex `index` under the controller's current pose.
    pub fn transform_vertex(
        &self,
        index: usize,
        controller: &SkeletalAnimationController,
    ) -> Result<Vec3> {
        let position = *self
            .mesh
            .positions
            .get(index)
            .ok_or_else(|| ForgeError::out_of_bounds("skinned mesh vertex", index))?;
        Ok(controller.transform_vertex(
            position,
            self.mesh.bone_indices[index],
            self.mesh.bone_weights[index],
        ))
    }

    fn shader_for(&self, group: &RenderGroup, pass: RenderPass) -> Option<ShaderId> {
        match pass {
            RenderPass::Shadow => group
                .shaders
                .shadow
                .map(|shader| self.shadow_pass_shader.unwrap_or(shader)),
            _ => group.shaders.for_pass(pass),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Actor {
    Static(StaticActor),
    Skeletal(SkeletalActor),
}

impl Actor {
    #[must_use]
    pub fn bounding_volume(&self) -> &BoundingVolume {
        match self {
            Actor::Static(actor) => &actor.bounding_volume,
            Actor::Skeletal(actor) => &actor.bounding_volume,
        }
    }

    #[must_use]
    pub fn render_groups(&self) -> &[RenderGroup] {
        match self {
            Actor::Static(actor) => &actor.render_groups,
            Actor::Skeletal(actor) => &actor.render_groups,
        }
    }

    #[must_use]
    pub fn as_skeletal(&self) -> Option<&SkeletalActor> {
        match self {
            Actor::Skeletal(actor) => Some(actor),
            Actor::Static(_) => None,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct ActorRegistry {
    controllers: SlotMap<ControllerKey, SkeletalAnimationController>,
    actors: SlotMap<ActorKey, Actor>,
}

impl ActorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_controller(&mut self, controller: SkeletalAnimationController) -> ControllerKey {
        let key = self.controllers.insert(controller);
        debug!("Registered animation controller {key:?}");
        key
    }

    #[inline]
    #[must_use]
    pub fn controller(&self, key: ControllerKey) -> Option<&SkeletalAnimationController> {
        self.controllers.get(key)
    }

    #[inline]
    pub fn controller_mut(&mut self, key: ControllerKey) -> Option<&mut SkeletalAnimationController> {
        self.controllers.get_mut(key)
    }

    pub fn add_static_actor(&mut self, actor: StaticActor) -> ActorKey {
        self.actors.insert(Actor::Static(actor))
    }

    /// Fails when the controller is unknown or when a weighted bone index of
    /// the mesh lies outside the controller's skeleton.
    pub fn add_skeletal_actor(
        &mut self,
        controller: ControllerKey,
        mesh: SkinnedMeshData,
        render_groups: Vec<RenderGroup>,
        bounding_volume: BoundingVolume,
    ) -> Result<ActorKey> {
        let bone_count = self
            .controllers
            .get(controller)
            .ok_or_else(|| {
                ForgeError::MissingReference(format!("unknown animation controller {controller:?}"))
            })?
            .skeleton()
            .len();

        if let Some(max_index) = mesh.max_bone_index()
            && max_index as usize >= bone_count
        {
            return Err(ForgeError::out_of_bounds(
                "bone index of skinned mesh",
                max_index as usize,
            ));
        }

        let key = self.actors.insert(Actor::Skeletal(SkeletalActor {
            controller,
            mesh,
            render_groups,
            bounding_volume,
            active_animation: None,
            shadow_pass_shader: None,
        }));
        debug!("Registered skeletal actor {key:?} ({bone_count} bones)");
        Ok(key)
    }

    #[inline]
    #[must_use]
    pub fn actor(&self, key: ActorKey) -> Option<&Actor> {
        self.actors.get(key)
    }

    #[inline]
    pub fn actor_mut(&mut self, key: ActorKey) -> Option<&mut Actor> {
        self.actors.get_mut(key)
    }

    pub fn skeletal_actor_mut(&mut self, key: ActorKey) -> Option<&mut SkeletalActor> {
        match self.actors.get_mut(key)? {
            Actor::Skeletal(actor) => Some(actor),
            Actor::Static(_) => None,
        }
    }

    /// Removes the actor. A skeletal actor's active instance is destroyed with it.
    pub fn remove_actor(&mut self, key: ActorKey) -> Option<Actor> {
        let actor = self.actors.remove(key)?;
        if let Actor::Skeletal(skeletal) = &actor
            && let Some(animation) = skeletal.active_animation
            && let Some(controller) = self.controllers.get_mut(skeletal.controller)
        {
            controller.destroy_animation(animation);
        }
        Some(actor)
    }

    #[inline]
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Starts `clip` on the actor's controller and makes it the active
    /// instance. A previously active instance is destroyed.
    pub fn play_animation(
        &mut self,
        actor: ActorKey,
        clip: ClipId,
        speed: f32,
        start_time: f32,
        loop_mode: LoopMode,
    ) -> Result<AnimationKey> {
        let Some(Actor::Skeletal(skeletal)) = self.actors.get_mut(actor) else {
            return Err(ForgeError::MissingReference(format!(
                "{actor:?} is not a skeletal actor"
            )));
        };
        let controller = self.controllers.get_mut(skeletal.controller).ok_or_else(|| {
            ForgeError::MissingReference(format!(
                "animation controller {:?} of {actor:?} was removed",
                skeletal.controller
            ))
        })?;

        let key = controller.create_animation_with_mode(clip, speed, start_time, loop_mode)?;
        if let Some(previous) = skeletal.active_animation.replace(key) {
            controller.destroy_animation(previous);
        }
        Ok(key)
    }

    /// Destroys the actor's active instance, returning it to the bind pose.
    /// Returns `false` when nothing was playing.
    pub fn stop_animation(&mut self, actor: ActorKey) -> bool {
        let Some(Actor::Skeletal(skeletal)) = self.actors.get_mut(actor) else {
            return false;
        };
        let Some(animation) = skeletal.active_animation.take() else {
            return false;
        };
        if let Some(controller) = self.controllers.get_mut(skeletal.controller) {
            controller.destroy_animation(animation);
        }
        true
    }

    /// Advances every controller's instances.
    pub fn update(&mut self, fps_scale: f32) {
        for controller in self.controllers.values_mut() {
            controller.update(fps_scale);
        }
    }

    /// Renders every request in order. Requests for removed actors are skipped.
    pub fn dispatch(&mut self, device: &mut dyn RenderDevice, requests: &[RenderRequest]) {
        for request in requests {
            self.render_actor(device, request);
        }
    }

    pub fn render_actor(&mut self, device: &mut dyn RenderDevice, request: &RenderRequest) {
        let Some(actor) = self.actors.get_mut(request.actor) else {
            warn!("Render request for removed actor {:?}", request.actor);
            return;
        };

        device.set_model_transform(request.model_matrix());

        match actor {
            Actor::Static(actor) => render_static(actor, device),
            Actor::Skeletal(actor) => {
                let Some(controller) = self.controllers.get_mut(actor.controller) else {
                    warn!(
                        "Skeletal actor {:?} references removed controller {:?}",
                        request.actor, actor.controller
                    );
                    return;
                };
                render_skeletal(actor, controller, device);
            }
        }
    }
}

fn render_static(actor: &StaticActor, device: &mut dyn RenderDevice) {
    let pass = device.active_pass();
    if pass == RenderPass::Lighting {
        return;
    }

    for group in &actor.render_groups {
        let Some(shader) = group.shaders.for_pass(pass) else {
            trace!("Render group has no shader for {pass:?}, skipped");
            continue;
        };
        device.activate_shader(shader);
        if pass != RenderPass::Shadow {
            device.activate_material(group.material);
        }
        device.draw_indexed(group.index_range.clone());
    }
}

fn render_skeletal(
    actor: &mut SkeletalActor,
    controller: &mut SkeletalAnimationController,
    device: &mut dyn RenderDevice,
) {
    if let Some(key) = actor.active_animation {
        match controller.animation(key) {
            Some(instance) if instance.is_finished() => {
                controller.destroy_animation(key);
                actor.active_animation = None;
            }
            Some(_) => {}
            None => {
                warn!("Skeletal actor holds a stale animation {key:?}, reverting to bind pose");
                actor.active_animation = None;
            }
        }
    }

    controller.apply_animation(actor.active_animation, true);

    let pass = device.active_pass();
    if pass == RenderPass::Lighting {
        return;
    }

    for group in &actor.render_groups {
        let Some(shader) = actor.shader_for(group, pass) else {
            trace!("Render group has no shader for {pass:?}, skipped");
            continue;
        };
        device.activate_shader(shader);
        if let Some(binding) = device.bone_binding_point(shader) {
            device.bind_bone_buffer(binding, controller.bone_buffer());
        }
        if pass != RenderPass::Shadow {
            device.activate_material(group.material);
        }
        device.draw_indexed(group.index_range.clone());
    }
}
