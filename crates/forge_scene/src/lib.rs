//! Scene graph, actors and the render boundary of the Forge engine.
//!
//! Per frame:
//!
//! ```text
//! SceneGraph::update(fps_scale)         integrate transformation deltas
//! ActorRegistry::update(fps_scale)      advance animation instances
//! SceneGraph::render(&actors, &mut ctx) cull + queue render requests
//! ActorRegistry::dispatch(&mut ctx, ..) shaders, bone buffers, draw calls
//! ```

pub mod actor;
pub mod graph;
pub mod render;

pub use actor::{
    Actor, ActorKey, ActorRegistry, ControllerKey, PassShaders, RenderGroup, SkeletalActor,
    SkinnedMeshData, StaticActor,
};
pub use graph::{GeometryNode, NodeKey, NodeKind, SceneGraph, SceneNode, TransformationNode};
pub use render::{
    DrawCommand, MaterialId, RenderContext, RenderDevice, RenderPass, RenderRequest, ShaderId,
    Visualization,
};
