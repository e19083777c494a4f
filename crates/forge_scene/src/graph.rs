//! Scene Graph
//!
//! An arena of [`SceneNode`]s addressed by [`NodeKey`]. Two node kinds exist:
//!
//! - **Transformation** nodes accumulate translation, rotation and scale and
//!   may carry per-frame deltas for simple procedural motion.
//! - **Geometry** nodes bind an actor and emit a [`RenderRequest`] when visible.
//!   They are leaves.
//!
//! # Composition
//!
//! ```text
//! Transformation:  T' = T + R * t      R' = R * r      S' = S ⊙ s
//! Geometry:        T' = T + t          R' = R * r      S' = S ⊙ s
//! ```
//!
//! The geometry offset is added without rotating it by the ancestor rotation.
//!
//! `update` is the only operation that mutates transforms; `render` is a
//! read-only traversal that only emits requests.

use glam::{Quat, Vec3};
use log::{debug, trace, warn};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use forge_core::errors::{ForgeError, Result};

use crate::actor::{ActorKey, ActorRegistry};
use crate::render::{RenderDevice, RenderRequest, Visualization};

new_key_type! {
    pub struct NodeKey;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformationNode {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Added per unit of fps scale.
    pub translation_delta: Vec3,
    /// Applied once per unit of fps scale.
    pub rotation_delta: Quat,
    pub scale_delta: Vec3,
}

impl Default for TransformationNode {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            translation_delta: Vec3::ZERO,
            rotation_delta: Quat::IDENTITY,
            scale_delta: Vec3::ZERO,
        }
    }
}

impl TransformationNode {
    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_deltas(mut self, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        self.translation_delta = translation;
        self.rotation_delta = rotation;
        self.scale_delta = scale;
        self
    }

    /// Integrates the deltas over `fps_scale` frames.
    ///
    /// Whole frames apply `rotation_delta` by repeated left-multiplication,
    /// the fractional remainder slerps towards one more application.
    pub fn integrate(&mut self, fps_scale: f32) {
        if !fps_scale.is_finite() {
            warn!("TransformationNode: ignoring non-finite fps scale {fps_scale}");
            return;
        }

        self.translation += self.translation_delta * fps_scale;

        let mut remainder = fps_scale;
        while remainder > 1.0 {
            self.rotation = (self.rotation_delta * self.rotation).normalize();
            remainder -= 1.0;
        }
        let target = self.rotation_delta * self.rotation;
        self.rotation = self.rotation.slerp(target, remainder).normalize();

        self.scale += self.scale_delta * fps_scale;
    }

    fn compose(&self, position: Vec3, rotation: Quat, scale: Vec3) -> (Vec3, Quat, Vec3) {
        (
            position + rotation * self.translation,
            rotation * self.rotation,
            scale * self.scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryNode {
    pub actor: ActorKey,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visualization: Visualization,
}

impl GeometryNode {
    #[must_use]
    pub fn new(actor: ActorKey) -> Self {
        Self {
            actor,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visualization: Visualization::Fill,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_visualization(mut self, visualization: Visualization) -> Self {
        self.visualization = visualization;
        self
    }

    fn compose(&self, position: Vec3, rotation: Quat, scale: Vec3) -> (Vec3, Quat, Vec3) {
        (
            position + self.position,
            rotation * self.rotation,
            scale * self.scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Transformation(TransformationNode),
    Geometry(GeometryNode),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    parent: Option<NodeKey>,
    children: SmallVec<[NodeKey; 4]>,
    update_enabled: bool,
    rendering_enabled: bool,
    pub kind: NodeKind,
}

impl SceneNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            update_enabled: true,
            rendering_enabled: true,
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn update_enabled(&self) -> bool {
        self.update_enabled
    }

    #[inline]
    #[must_use]
    pub fn rendering_enabled(&self) -> bool {
        self.rendering_enabled
    }

    #[must_use]
    pub fn as_transformation(&self) -> Option<&TransformationNode> {
        match &self.kind {
            NodeKind::Transformation(t) => Some(t),
            NodeKind::Geometry(_) => None,
        }
    }

    pub fn as_transformation_mut(&mut self) -> Option<&mut TransformationNode> {
        match &mut self.kind {
            NodeKind::Transformation(t) => Some(t),
            NodeKind::Geometry(_) => None,
        }
    }

    #[must_use]
    pub fn as_geometry(&self) -> Option<&GeometryNode> {
        match &self.kind {
            NodeKind::Geometry(g) => Some(g),
            NodeKind::Transformation(_) => None,
        }
    }

    fn compose(&self, position: Vec3, rotation: Quat, scale: Vec3) -> (Vec3, Quat, Vec3) {
        match &self.kind {
            NodeKind::Transformation(t) => t.compose(position, rotation, scale),
            NodeKind::Geometry(g) => g.compose(position, rotation, scale),
        }
    }
}

/// Node tree with a single root.
///
/// Nodes added without a parent become the root if none exists yet and are
/// detached otherwise; detached subtrees are neither updated nor rendered
/// until attached.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    root: Option<NodeKey>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    pub fn add_transformation(
        &mut self,
        parent: Option<NodeKey>,
        node: TransformationNode,
    ) -> Result<NodeKey> {
        self.add_node(parent, NodeKind::Transformation(node))
    }

    pub fn add_geometry(&mut self, parent: Option<NodeKey>, node: GeometryNode) -> Result<NodeKey> {
        self.add_node(parent, NodeKind::Geometry(node))
    }

    fn add_node(&mut self, parent: Option<NodeKey>, kind: NodeKind) -> Result<NodeKey> {
        if let Some(parent) = parent {
            self.check_can_parent(parent)?;
        }

        let key = self.nodes.insert(SceneNode::new(kind));
        match parent {
            Some(parent) => self.link(key, parent),
            None if self.root.is_none() => {
                debug!("SceneGraph: {key:?} becomes the root node");
                self.root = Some(key);
            }
            None => {}
        }
        Ok(key)
    }

    fn check_can_parent(&self, parent: NodeKey) -> Result<()> {
        let node = self.nodes.get(parent).ok_or_else(|| {
            ForgeError::MissingReference(format!("unknown scene node {parent:?}"))
        })?;
        if node.as_geometry().is_some() {
            return Err(ForgeError::Structural(format!(
                "geometry node {parent:?} cannot have children"
            )));
        }
        Ok(())
    }

    fn link(&mut self, child: NodeKey, parent: NodeKey) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Moves `child` (with its subtree) under `parent`.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(ForgeError::MissingReference(format!(
                "unknown scene node {child:?}"
            )));
        }
        self.check_can_parent(parent)?;

        if child == parent || self.is_ancestor(child, parent) {
            return Err(ForgeError::Structural(format!(
                "attaching {child:?} under {parent:?} would create a cycle"
            )));
        }
        if self.root == Some(child) {
            return Err(ForgeError::Structural(format!(
                "root node {child:?} cannot be attached to a parent"
            )));
        }

        self.unlink(child);
        self.link(child, parent);
        Ok(())
    }

    /// Detaches `child` from its parent; the subtree stays alive.
    pub fn detach(&mut self, child: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(ForgeError::MissingReference(format!(
                "unknown scene node {child:?}"
            )));
        }
        self.unlink(child);
        Ok(())
    }

    fn unlink(&mut self, child: NodeKey) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent)
            && let Some(i) = p.children.iter().position(|&x| x == child)
        {
            p.children.remove(i);
        }
    }

    /// Whether `ancestor` lies on the parent chain of `node`.
    fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(|n| n.parent);
        }
        false
    }

    /// Removes `key` and its whole subtree; returns the number of removed nodes.
    pub fn remove(&mut self, key: NodeKey) -> usize {
        if !self.nodes.contains_key(key) {
            return 0;
        }
        self.unlink(key);
        if self.root == Some(key) {
            self.root = None;
        }

        let mut removed = 0;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        removed
    }

    /// Makes a parentless node the root of the graph.
    pub fn set_root(&mut self, key: NodeKey) -> Result<()> {
        let node = self.nodes.get(key).ok_or_else(|| {
            ForgeError::MissingReference(format!("unknown scene node {key:?}"))
        })?;
        if node.parent.is_some() {
            return Err(ForgeError::Structural(format!(
                "{key:?} has a parent and cannot become the root"
            )));
        }
        self.root = Some(key);
        Ok(())
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    #[inline]
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn transformation_mut(&mut self, key: NodeKey) -> Option<&mut TransformationNode> {
        self.nodes.get_mut(key)?.as_transformation_mut()
    }

    #[must_use]
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(SceneNode::children).unwrap_or_default()
    }

    #[must_use]
    pub fn child_count(&self, key: NodeKey) -> usize {
        self.children(key).len()
    }

    #[must_use]
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key)?.parent
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `false` for unknown nodes.
    pub fn enable(&mut self, key: NodeKey, update: bool, rendering: bool) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.update_enabled = update;
                node.rendering_enabled = rendering;
                true
            }
            None => false,
        }
    }

    /// `(update_enabled, rendering_enabled)`.
    #[must_use]
    pub fn enabled(&self, key: NodeKey) -> Option<(bool, bool)> {
        self.nodes
            .get(key)
            .map(|n| (n.update_enabled, n.rendering_enabled))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Integrates transformation deltas, parents before children.
    ///
    /// Disabled nodes are not integrated, but their children still are.
    pub fn update(&mut self, fps_scale: f32) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack: SmallVec<[NodeKey; 32]> = SmallVec::new();
        stack.push(root);
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            if node.update_enabled
                && let NodeKind::Transformation(transformation) = &mut node.kind
            {
                transformation.integrate(fps_scale);
            }
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Emits a render request for every visible Geometry node reachable from
    /// the root, tagged with the device's active pass.
    pub fn render(&self, actors: &ActorRegistry, device: &mut dyn RenderDevice) {
        if let Some(root) = self.root {
            self.render_from(root, actors, device, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        }
    }

    /// Renders the subtree of `key` under the given accumulated ancestor transform.
    pub fn render_from(
        &self,
        key: NodeKey,
        actors: &ActorRegistry,
        device: &mut dyn RenderDevice,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if !node.rendering_enabled {
            return;
        }

        let (position, rotation, scale) = node.compose(position, rotation, scale);

        match &node.kind {
            NodeKind::Transformation(_) => {
                for &child in &node.children {
                    self.render_from(child, actors, device, position, rotation, scale);
                }
            }
            NodeKind::Geometry(geometry) => {
                let Some(actor) = actors.actor(geometry.actor) else {
                    warn!("Geometry node {key:?} references removed actor {:?}", geometry.actor);
                    return;
                };
                if let Some(frustum) = device.active_frustum()
                    && !frustum.visible(actor.bounding_volume(), rotation, position, scale)
                {
                    trace!("Geometry node {key:?} culled");
                    return;
                }

                let request = RenderRequest {
                    actor: geometry.actor,
                    rotation,
                    position,
                    scale,
                    pass: device.active_pass(),
                    visualization: geometry.visualization,
                };
                device.request_rendering(request);
            }
        }
    }

    /// Accumulated `(position, rotation, scale)` of `key`, including its own
    /// transform, composed from the top of its ancestor chain.
    #[must_use]
    pub fn build_transformation(&self, key: NodeKey) -> Option<(Vec3, Quat, Vec3)> {
        let mut chain: SmallVec<[NodeKey; 16]> = SmallVec::new();
        let mut current = Some(key);
        while let Some(k) = current {
            let node = self.nodes.get(k)?;
            chain.push(k);
            current = node.parent;
        }

        let mut transform = (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        for &k in chain.iter().rev() {
            let (position, rotation, scale) = transform;
            transform = self.nodes[k].compose(position, rotation, scale);
        }
        Some(transform)
    }
}
