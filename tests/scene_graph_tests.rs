//! Scene Graph Tests
//!
//! Tests for:
//! - Transform composition through Transformation and Geometry nodes
//! - Delta integration in `update` (including large fps scales)
//! - Frustum culling of Geometry nodes and the always-visible unknown volume
//! - Read-only `render` traversal

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Quat, Vec3};

use forge::forge_core::bounds::{BoundingBox, BoundingSphere, BoundingVolume};
use forge::forge_core::camera::Camera;
use forge::forge_core::settings::RenderSettings;
use forge::forge_scene::{
    ActorKey, ActorRegistry, GeometryNode, RenderContext, RenderDevice, RenderPass, SceneGraph,
    StaticActor, TransformationNode, Visualization,
};

const EPSILON: f32 = 1e-5;

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn approx_quat(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - 1e-4
}

fn actor_with_volume(actors: &mut ActorRegistry, volume: BoundingVolume) -> ActorKey {
    actors.add_static_actor(StaticActor {
        render_groups: Vec::new(),
        bounding_volume: volume,
    })
}

/// Camera at the origin looking down -Z.
fn camera_looking_down_negative_z() -> Camera {
    let mut camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    camera.look_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    camera
}

fn context_with_camera() -> RenderContext {
    let mut context = RenderContext::new(RenderSettings::default());
    context.set_camera(camera_looking_down_negative_z());
    context
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn nested_translations_accumulate() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    let root = graph
        .add_transformation(None, TransformationNode::from_translation(Vec3::X))
        .unwrap();
    let inner = graph
        .add_transformation(Some(root), TransformationNode::from_translation(Vec3::Y))
        .unwrap();
    graph.add_geometry(Some(inner), GeometryNode::new(actor)).unwrap();

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);

    let requests = context.requests();
    assert_eq!(requests.len(), 1);
    assert!(approx_vec3(requests[0].position, Vec3::new(1.0, 1.0, 0.0)));
    assert_eq!(requests[0].rotation, Quat::IDENTITY);
    assert_eq!(requests[0].scale, Vec3::ONE);
}

#[test]
fn ancestor_rotation_rotates_translation_and_scales_multiply() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    let root = graph
        .add_transformation(
            None,
            TransformationNode::new(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2), Vec3::new(2.0, 1.0, 1.0)),
        )
        .unwrap();
    let arm = graph
        .add_transformation(
            Some(root),
            TransformationNode::new(Vec3::X, Quat::IDENTITY, Vec3::new(1.0, 3.0, 1.0)),
        )
        .unwrap();
    let geometry = graph.add_geometry(Some(arm), GeometryNode::new(actor)).unwrap();

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);

    let request = context.requests()[0];
    // Rotating +X by 90 degrees about Y gives -Z
    assert!(approx_vec3(request.position, Vec3::new(0.0, 0.0, -1.0)));
    assert!(approx_vec3(request.scale, Vec3::new(2.0, 3.0, 1.0)));
    assert!(approx_quat(request.rotation, Quat::from_rotation_y(FRAC_PI_2)));

    let (position, rotation, scale) = graph.build_transformation(geometry).unwrap();
    assert!(approx_vec3(position, request.position));
    assert!(approx_quat(rotation, request.rotation));
    assert!(approx_vec3(scale, request.scale));
}

#[test]
fn geometry_offset_is_not_rotated() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    let root = graph
        .add_transformation(
            None,
            TransformationNode::new(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2), Vec3::ONE),
        )
        .unwrap();
    graph
        .add_geometry(
            Some(root),
            GeometryNode::new(actor)
                .with_offset(Vec3::X, Quat::IDENTITY, Vec3::ONE)
                .with_visualization(Visualization::Wireframe),
        )
        .unwrap();

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);

    let request = context.requests()[0];
    assert!(approx_vec3(request.position, Vec3::X));
    assert_eq!(request.visualization, Visualization::Wireframe);
}

#[test]
fn render_is_tagged_with_active_pass() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    graph.add_geometry(None, GeometryNode::new(actor)).unwrap();

    let mut context = RenderContext::default();
    context.set_active_pass(RenderPass::Shadow);
    graph.render(&actors, &mut context);
    assert_eq!(context.requests()[0].pass, RenderPass::Shadow);
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn update_integrates_translation_and_scale() {
    let mut graph = SceneGraph::new();
    let node = graph
        .add_transformation(
            None,
            TransformationNode::default().with_deltas(
                Vec3::new(0.5, 0.0, 0.0),
                Quat::IDENTITY,
                Vec3::splat(0.1),
            ),
        )
        .unwrap();

    graph.update(2.0);
    graph.update(0.5);

    let transformation = graph.node(node).unwrap().as_transformation().unwrap();
    assert!(approx_vec3(transformation.translation, Vec3::new(1.25, 0.0, 0.0)));
    assert!(approx_vec3(transformation.scale, Vec3::splat(1.25)));
}

#[test]
fn children_receive_the_same_fps_scale() {
    let mut graph = SceneGraph::new();
    let step = TransformationNode::default().with_deltas(Vec3::Y, Quat::IDENTITY, Vec3::ZERO);
    let root = graph.add_transformation(None, step).unwrap();
    let child = graph.add_transformation(Some(root), step).unwrap();
    let grandchild = graph.add_transformation(Some(child), step).unwrap();

    graph.update(3.0);

    for key in [root, child, grandchild] {
        let t = graph.node(key).unwrap().as_transformation().unwrap();
        assert!(approx_vec3(t.translation, Vec3::new(0.0, 3.0, 0.0)));
    }
}

#[test]
fn rotation_delta_gives_constant_angular_velocity() {
    let delta = Quat::from_rotation_y(PI / 16.0);

    // One update covering 4 frames equals four single-frame updates
    let mut batched = TransformationNode::default().with_deltas(Vec3::ZERO, delta, Vec3::ZERO);
    batched.integrate(4.0);

    let mut stepped = TransformationNode::default().with_deltas(Vec3::ZERO, delta, Vec3::ZERO);
    for _ in 0..4 {
        stepped.integrate(1.0);
    }

    assert!(approx_quat(batched.rotation, stepped.rotation));
    assert!(approx_quat(batched.rotation, Quat::from_rotation_y(PI / 4.0)));
}

#[test]
fn large_fps_scale_catch_up_stays_normalized() {
    // Multi-frame catch-up: 37.5 frames of a small rotation in one update
    let delta = Quat::from_rotation_x(0.01);
    let mut node = TransformationNode::default().with_deltas(Vec3::ZERO, delta, Vec3::ZERO);
    node.integrate(37.5);

    assert!((node.rotation.length() - 1.0).abs() < 1e-4);
    assert!(approx_quat(node.rotation, Quat::from_rotation_x(0.375)));
}

#[test]
fn large_fps_scale_with_half_turn_delta() {
    // A delta of half a turn per frame: 3.5 frames lands at 1.75 turns
    let delta = Quat::from_rotation_z(PI);
    let mut node = TransformationNode::default().with_deltas(Vec3::ZERO, delta, Vec3::ZERO);
    node.integrate(3.5);

    let expected = Quat::from_rotation_z(3.5 * PI);
    assert!(approx_quat(node.rotation, expected));
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn unknown_volume_is_never_culled() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    // Behind the camera: outside the frustum
    let root = graph
        .add_transformation(None, TransformationNode::from_translation(Vec3::new(0.0, 0.0, 50.0)))
        .unwrap();
    graph.add_geometry(Some(root), GeometryNode::new(actor)).unwrap();

    let mut context = context_with_camera();
    assert!(context.active_frustum().is_some());
    graph.render(&actors, &mut context);

    assert_eq!(context.requests().len(), 1);
}

#[test]
fn bounded_volume_outside_frustum_is_culled() {
    let mut actors = ActorRegistry::new();
    let sphere = actor_with_volume(
        &mut actors,
        BoundingVolume::Sphere(BoundingSphere::new(Vec3::ZERO, 1.0)),
    );
    let aabb = actor_with_volume(
        &mut actors,
        BoundingVolume::Aabb(BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE)),
    );

    let mut graph = SceneGraph::new();
    let root = graph.add_transformation(None, TransformationNode::default()).unwrap();
    let behind = graph
        .add_transformation(Some(root), TransformationNode::from_translation(Vec3::new(0.0, 0.0, 50.0)))
        .unwrap();
    let ahead = graph
        .add_transformation(Some(root), TransformationNode::from_translation(Vec3::new(0.0, 0.0, -10.0)))
        .unwrap();
    for parent in [behind, ahead] {
        graph.add_geometry(Some(parent), GeometryNode::new(sphere)).unwrap();
        graph.add_geometry(Some(parent), GeometryNode::new(aabb)).unwrap();
    }

    let mut context = context_with_camera();
    graph.render(&actors, &mut context);

    let requests = context.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| approx_vec3(r.position, Vec3::new(0.0, 0.0, -10.0))));
}

#[test]
fn scaled_sphere_reaches_into_frustum() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(
        &mut actors,
        BoundingVolume::Sphere(BoundingSphere::new(Vec3::ZERO, 1.0)),
    );

    let mut graph = SceneGraph::new();
    // Center behind the near plane, radius 1 * 5 reaches past it
    let root = graph
        .add_transformation(
            None,
            TransformationNode::new(Vec3::new(0.0, 0.0, 2.0), Quat::IDENTITY, Vec3::splat(5.0)),
        )
        .unwrap();
    graph.add_geometry(Some(root), GeometryNode::new(actor)).unwrap();

    let mut context = context_with_camera();
    graph.render(&actors, &mut context);
    assert_eq!(context.requests().len(), 1);
}

#[test]
fn disabling_culling_renders_everything() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(
        &mut actors,
        BoundingVolume::Sphere(BoundingSphere::new(Vec3::ZERO, 1.0)),
    );

    let mut graph = SceneGraph::new();
    let root = graph
        .add_transformation(None, TransformationNode::from_translation(Vec3::new(0.0, 0.0, 50.0)))
        .unwrap();
    graph.add_geometry(Some(root), GeometryNode::new(actor)).unwrap();

    let mut context = context_with_camera();
    context.settings.frustum_culling = false;
    graph.render(&actors, &mut context);
    assert_eq!(context.requests().len(), 1);
}

#[test]
fn rendering_disabled_skips_subtree() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    let root = graph.add_transformation(None, TransformationNode::default()).unwrap();
    let hidden = graph.add_transformation(Some(root), TransformationNode::default()).unwrap();
    graph.add_geometry(Some(hidden), GeometryNode::new(actor)).unwrap();
    graph.add_geometry(Some(root), GeometryNode::new(actor)).unwrap();

    graph.enable(hidden, true, false);
    assert_eq!(graph.enabled(hidden), Some((true, false)));

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);
    assert_eq!(context.requests().len(), 1);
}

#[test]
fn removed_actor_is_skipped() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    graph.add_geometry(None, GeometryNode::new(actor)).unwrap();
    actors.remove_actor(actor);

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);
    assert!(context.requests().is_empty());
}

// ============================================================================
// Read-only render
// ============================================================================

#[test]
fn repeated_render_is_idempotent() {
    let mut actors = ActorRegistry::new();
    let actor = actor_with_volume(&mut actors, BoundingVolume::Unknown);

    let mut graph = SceneGraph::new();
    let spinning = TransformationNode::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_x(0.3), Vec3::ONE)
        .with_deltas(Vec3::X, Quat::from_rotation_y(0.1), Vec3::splat(0.01));
    let root = graph.add_transformation(None, spinning).unwrap();
    graph.add_geometry(Some(root), GeometryNode::new(actor)).unwrap();
    graph.update(1.5);

    let before = *graph.node(root).unwrap().as_transformation().unwrap();

    let mut context = RenderContext::default();
    graph.render(&actors, &mut context);
    let first = context.take_requests();
    graph.render(&actors, &mut context);
    let second = context.take_requests();

    assert_eq!(first, second);
    assert_eq!(*graph.node(root).unwrap().as_transformation().unwrap(), before);
}
