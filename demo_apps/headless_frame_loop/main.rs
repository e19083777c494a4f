//! Headless Frame Loop
//!
//! Builds a small scene without a window or GPU:
//! - a rotating turntable carrying a skinned, animated three-bone arm
//! - a static crate next to it, and one far behind the camera (culled)
//!
//! Runs a fixed number of frames through `Engine::frame` and logs the
//! recorded draw commands. Set `RUST_LOG=debug` for the controller and
//! registry messages.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use glam::{Mat4, Quat, Vec3};
use log::info;

use forge::forge_animation::{
    AnimationClip, BoneKeyframeTrack, KeyframeTrack, LocalPose, LoopMode,
    SkeletalAnimationController, SkeletonBuilder,
};
use forge::forge_core::bounds::{BoundingBox, BoundingSphere, BoundingVolume};
use forge::forge_scene::{
    DrawCommand, GeometryNode, MaterialId, PassShaders, RenderGroup, SkinnedMeshData, StaticActor,
};
use forge::{Camera, Engine, TransformationNode};

const FRAMES: u32 = 90;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut engine = Engine::default();

    let mut camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y);
    engine.context.set_camera(camera);

    let skinned = engine.context.register_shader("skinned_lit", Some(4));
    let skinned_shadow = engine.context.register_shader("skinned_shadow", Some(4));
    let lit = engine.context.register_shader("lit", None);
    let shadow = engine.context.register_shader("shadow", None);

    // === Skeleton: shoulder -> elbow -> wrist, one unit apart along +Y ===
    let mut builder = SkeletonBuilder::new("arm");
    let mut parent = None;
    for (i, name) in ["shoulder", "elbow", "wrist"].into_iter().enumerate() {
        let rest = if i == 0 { Vec3::ZERO } else { Vec3::Y };
        parent = Some(builder.add_bone_with_rest_pose(
            name,
            parent,
            Mat4::from_translation(Vec3::new(0.0, -(i as f32), 0.0)),
            LocalPose::new(rest, Quat::IDENTITY, Vec3::ONE),
        ));
    }
    let skeleton = Arc::new(builder.build().context("building arm skeleton")?);

    // === Clip: the elbow bends back and forth over 60 frames ===
    let bend = BoneKeyframeTrack::new(
        KeyframeTrack::empty(),
        KeyframeTrack::from_keyframes([
            (0.0, Quat::IDENTITY),
            (30.0, Quat::from_rotation_z(1.2)),
            (60.0, Quat::IDENTITY),
        ]),
        KeyframeTrack::empty(),
    );
    let wave = AnimationClip::from_named_tracks("wave", 60.0, [("elbow".to_string(), bend)], &skeleton)
        .with_ticks_per_second(60.0);

    let mut controller = SkeletalAnimationController::new(Arc::clone(&skeleton))?;
    let wave_id = controller.add_clip(Arc::new(wave));
    let controller_key = engine.actors.add_controller(controller);

    // Two vertices per bone, fully weighted
    let positions: Vec<Vec3> = (0..6).map(|i| Vec3::new(0.1 * (i % 2) as f32, (i / 2) as f32, 0.0)).collect();
    let bone_indices = (0..6).map(|i| [i / 2, 0, 0, 0]).collect();
    let bone_weights = vec![[1.0, 0.0, 0.0, 0.0]; 6];
    let mesh = SkinnedMeshData::new(positions, bone_indices, bone_weights)?;

    let arm = engine.actors.add_skeletal_actor(
        controller_key,
        mesh,
        vec![RenderGroup {
            shaders: PassShaders {
                shadow: Some(shadow),
                ..PassShaders::uniform(skinned)
            },
            material: MaterialId(0),
            index_range: 0..12,
        }],
        BoundingVolume::Sphere(BoundingSphere::new(Vec3::new(0.0, 1.5, 0.0), 1.5)),
    )?;
    engine
        .actors
        .skeletal_actor_mut(arm)
        .context("arm actor just registered")?
        .set_shadow_pass_shader(Some(skinned_shadow));
    engine
        .actors
        .play_animation(arm, wave_id, 1.0, 0.0, LoopMode::Loop)?;

    let crate_actor = engine.actors.add_static_actor(StaticActor {
        render_groups: vec![RenderGroup {
            shaders: PassShaders {
                shadow: Some(shadow),
                ..PassShaders::uniform(lit)
            },
            material: MaterialId(1),
            index_range: 0..36,
        }],
        bounding_volume: BoundingVolume::Aabb(BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5))),
    });

    // === Scene graph ===
    let root = engine.scene.add_transformation(None, TransformationNode::default())?;
    let turntable = engine.scene.add_transformation(
        Some(root),
        TransformationNode::default().with_deltas(Vec3::ZERO, Quat::from_rotation_y(0.02), Vec3::ZERO),
    )?;
    engine.scene.add_geometry(Some(turntable), GeometryNode::new(arm))?;
    engine.scene.add_geometry(
        Some(root),
        GeometryNode::new(crate_actor).with_offset(Vec3::new(2.5, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE),
    )?;
    let far_away = engine
        .scene
        .add_transformation(Some(root), TransformationNode::from_translation(Vec3::new(0.0, 0.0, 40.0)))?;
    engine.scene.add_geometry(Some(far_away), GeometryNode::new(crate_actor))?;

    // === Frame loop ===
    let frame_time = Duration::from_secs_f64(1.0 / 60.0);
    let mut total_draws = 0;

    for frame in 0..FRAMES {
        let stats = engine.frame(frame_time);
        total_draws += stats.draw_calls;

        let commands = engine.context.take_commands();
        if frame % 30 == 0 {
            info!(
                "frame {frame}: {} requests, {} draw calls",
                stats.requests, stats.draw_calls
            );
            for command in &commands {
                if let DrawCommand::BindBoneBuffer { label, version, .. } = command {
                    info!("  bone buffer '{label}' at version {version}");
                }
            }
        }
    }

    let arm_actor = engine
        .actors
        .actor(arm)
        .and_then(|a| a.as_skeletal())
        .context("arm actor missing after frame loop")?;
    let controller = engine
        .actors
        .controller(controller_key)
        .context("arm controller missing after frame loop")?;
    let fingertip = arm_actor.transform_vertex(5, controller)?;

    info!("{FRAMES} frames, {total_draws} draw calls, fingertip at {fingertip:?}");
    Ok(())
}
