//! Skeletal Animation Tests
//!
//! Tests for:
//! - SkeletonHierarchy dense indexing and validation
//! - KeyframeTrack boundary exactness, clamping and per-channel fallback
//! - AnimationInstance finish / wrap behavior through the controller
//! - Skinning matrix computation and snapshot export

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use forge::forge_animation::{
    AnimationClip, BoneKeyframeTrack, InterpolationMode, KeyframeCursor, KeyframeTrack, LocalPose,
    SkeletalAnimationController, SkeletonBuilder, SkeletonHierarchy,
};
use forge::ForgeError;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn approx_quat(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn approx_mat4(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

/// root -> spine -> (left_arm, right_arm)
fn humanoid() -> Arc<SkeletonHierarchy> {
    let mut builder = SkeletonBuilder::new("humanoid");
    let root = builder.add_bone("root", None, Mat4::IDENTITY);
    let spine = builder.add_bone(
        "spine",
        Some(root),
        Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
    );
    builder.add_bone(
        "left_arm",
        Some(spine),
        Mat4::from_translation(Vec3::new(1.0, -2.0, 0.0)),
    );
    builder.add_bone(
        "right_arm",
        Some(spine),
        Mat4::from_translation(Vec3::new(-1.0, -2.0, 0.0)),
    );
    Arc::new(builder.build().unwrap())
}

fn linear_positions(keys: &[(f32, Vec3)]) -> KeyframeTrack<Vec3> {
    KeyframeTrack::from_keyframes(keys.iter().copied())
}

fn controller_with_clip(duration: f32) -> (SkeletalAnimationController, usize) {
    let mut controller = SkeletalAnimationController::new(humanoid()).unwrap();
    let track = BoneKeyframeTrack::new(
        linear_positions(&[(0.0, Vec3::ZERO), (duration, Vec3::new(0.0, 0.0, 4.0))]),
        KeyframeTrack::empty(),
        KeyframeTrack::empty(),
    );
    let clip_id = controller.add_clip(Arc::new(AnimationClip::new("walk", duration, [(0, track)])));
    (controller, clip_id)
}

// ============================================================================
// SkeletonHierarchy
// ============================================================================

#[test]
fn bone_ids_are_dense_and_stable() {
    let skeleton = humanoid();
    assert_eq!(skeleton.len(), 4);

    for (expected, bone) in skeleton.iter().enumerate() {
        assert_eq!(bone.id(), expected);
        assert_eq!(skeleton.bone(bone.id()).unwrap().id(), bone.id());
    }
}

#[test]
fn invalid_bone_id_is_out_of_bounds() {
    let skeleton = humanoid();
    let err = skeleton.bone(4).unwrap_err();
    assert!(matches!(err, ForgeError::IndexOutOfBounds { index: 4, .. }));
}

#[test]
fn unknown_parent_is_structural() {
    let mut builder = SkeletonBuilder::new("broken");
    builder.add_bone("root", None, Mat4::IDENTITY);
    builder.add_bone("orphan", Some(7), Mat4::IDENTITY);
    assert!(matches!(builder.build(), Err(ForgeError::Structural(_))));
}

#[test]
fn traversal_order_places_parents_first() {
    let skeleton = humanoid();
    let order = skeleton.traversal_order();
    let position = |id: usize| order.iter().position(|&x| x == id).unwrap();

    for bone in skeleton.iter() {
        if let Some(parent) = bone.parent() {
            assert!(position(parent) < position(bone.id()));
        }
    }
}

// ============================================================================
// KeyframeTrack sampling
// ============================================================================

#[test]
fn sampling_on_keyframe_is_exact() {
    let values = [
        Vec3::new(0.1, 0.2, 0.3),
        Vec3::new(1.7, -2.3, 0.9),
        Vec3::new(5.0, 5.0, 5.0),
    ];
    let track = KeyframeTrack::new(vec![0.0, 0.7, 2.0], values.to_vec(), InterpolationMode::Linear);

    assert_eq!(track.sample(0.0), Some(values[0]));
    assert_eq!(track.sample(0.7), Some(values[1]));
    assert_eq!(track.sample(2.0), Some(values[2]));
}

#[test]
fn sampling_outside_range_clamps() {
    let rotations = vec![
        Quat::IDENTITY,
        Quat::from_rotation_y(FRAC_PI_2),
        Quat::from_rotation_x(FRAC_PI_2),
    ];
    let track = KeyframeTrack::new(vec![0.0, 1.0, 2.0], rotations.clone(), InterpolationMode::Linear);

    assert_eq!(track.sample(-5.0), Some(rotations[0]));
    assert_eq!(track.sample(100.0), Some(rotations[2]));
}

#[test]
fn rotation_channel_slerps() {
    let track = KeyframeTrack::from_keyframes([(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_z(FRAC_PI_2))]);
    let mid = track.sample(0.5).unwrap();
    assert!(approx_quat(mid, Quat::from_rotation_z(FRAC_PI_2 / 2.0)));
}

#[test]
fn step_interpolation_holds_previous_value() {
    let track = KeyframeTrack::new(vec![0.0, 1.0], vec![1.0_f32, 9.0], InterpolationMode::Step);
    assert_eq!(track.sample(0.99), Some(1.0));
    assert_eq!(track.sample(1.0), Some(9.0));
}

#[test]
fn cursor_handles_scrubbing_backwards() {
    let times: Vec<f32> = (0..20).map(|i| i as f32).collect();
    let values: Vec<f32> = times.iter().map(|t| t * 10.0).collect();
    let track = KeyframeTrack::new(times, values, InterpolationMode::Linear);

    let mut cursor = KeyframeCursor::default();
    for t in [2.5_f32, 3.5, 17.25, 1.5, 0.25, 12.0] {
        let cached = track.sample_with_cursor(t, &mut cursor).unwrap();
        let fresh = track.sample(t).unwrap();
        assert!(approx(cached, fresh), "t={t}: {cached} vs {fresh}");
        assert!(approx(cached, t * 10.0));
    }
}

/// Missing channels do not fail the sample. Each channel independently falls
/// back to the bone's rest pose value, so a track with only rotations keeps
/// the rest position and scale. This silently hides incomplete exports; the
/// test pins the behavior so that any change to it is deliberate.
#[test]
fn missing_channel_falls_back_to_rest_pose_per_channel() {
    let rest = LocalPose::new(Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY, Vec3::splat(2.0));
    let track = BoneKeyframeTrack::new(
        KeyframeTrack::empty(),
        KeyframeTrack::from_keyframes([(0.0, Quat::from_rotation_x(1.0))]),
        KeyframeTrack::empty(),
    );

    let pose = track.sample(0.5, &rest);
    assert_eq!(pose.position, rest.position);
    assert_eq!(pose.scale, rest.scale);
    assert!(approx_quat(pose.rotation, Quat::from_rotation_x(1.0)));

    // With the default identity rest pose the fallback is the identity transform
    let identity_pose = track.sample(0.5, &LocalPose::IDENTITY);
    assert_eq!(identity_pose.position, Vec3::ZERO);
    assert_eq!(identity_pose.scale, Vec3::ONE);
}

#[test]
fn channels_use_independent_timestamps() {
    let track = BoneKeyframeTrack::new(
        linear_positions(&[(0.0, Vec3::ZERO), (4.0, Vec3::new(4.0, 0.0, 0.0))]),
        KeyframeTrack::from_keyframes([(0.0, Quat::IDENTITY)]),
        KeyframeTrack::from_keyframes([
            (0.0, Vec3::ONE),
            (1.0, Vec3::splat(2.0)),
            (2.0, Vec3::splat(3.0)),
        ]),
    );

    let pose = track.sample(1.5, &LocalPose::IDENTITY);
    assert!(approx_vec3(pose.position, Vec3::new(1.5, 0.0, 0.0)));
    assert!(approx_vec3(pose.scale, Vec3::splat(2.5)));
    assert_eq!(track.end_time(), Some(4.0));
}

// ============================================================================
// Playback
// ============================================================================

#[test]
fn speed_scales_advance() {
    let (mut controller, clip) = controller_with_clip(10.0);
    let key = controller.create_animation(clip, 2.0, 0.0).unwrap();

    controller.update(0.5);
    assert!(approx(controller.animation(key).unwrap().time(), 1.0));
}

#[test]
fn non_looping_instance_finishes_at_duration() {
    let (mut controller, clip) = controller_with_clip(3.0);
    let key = controller.create_animation(clip, 1.0, 0.0).unwrap();

    controller.update(1.0);
    controller.update(1.0);
    assert!(!controller.animation(key).unwrap().is_finished());

    controller.update(1.0);
    let instance = controller.animation(key).unwrap();
    assert!(instance.is_finished());
    assert!(approx(instance.time(), 3.0));
}

#[test]
fn looping_instance_wraps_into_range() {
    let (mut controller, clip) = controller_with_clip(3.0);
    let key = controller.create_looping_animation(clip, 1.0, 0.0).unwrap();

    for _ in 0..7 {
        controller.update(0.5);
    }
    let instance = controller.animation(key).unwrap();
    assert!(!instance.is_finished());
    assert!(instance.time() >= 0.0 && instance.time() < 3.0);
    assert!(approx(instance.time(), 0.5));
}

#[test]
fn paused_instances_hold_time() {
    let (mut controller, clip) = controller_with_clip(3.0);
    let key = controller.create_animation(clip, 1.0, 0.5).unwrap();

    assert!(controller.pause_animation(key));
    controller.update(1.0);
    assert!(approx(controller.animation(key).unwrap().time(), 0.5));

    assert!(controller.resume_animation(key));
    controller.update(1.0);
    assert!(approx(controller.animation(key).unwrap().time(), 1.5));
}

#[test]
fn destroyed_key_is_stale() {
    let (mut controller, clip) = controller_with_clip(3.0);
    let key = controller.create_animation(clip, 1.0, 0.0).unwrap();
    assert_eq!(controller.active_animation_count(), 1);

    controller.destroy_animation(key);
    assert_eq!(controller.active_animation_count(), 0);
    assert!(controller.animation(key).is_none());
    assert!(!controller.pause_animation(key));
}

// ============================================================================
// Skinning
// ============================================================================

#[test]
fn bind_pose_gives_identity_skinning() {
    let mut controller = SkeletalAnimationController::new(humanoid()).unwrap();

    // Rest poses that reproduce the bind pose exactly
    let poses = [
        LocalPose::IDENTITY,
        LocalPose::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
        LocalPose::new(Vec3::new(-1.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
        LocalPose::new(Vec3::new(1.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
    ];
    controller.apply_pose(&poses, true);

    for matrix in controller.skinning_matrices() {
        assert!(approx_mat4(*matrix, Mat4::IDENTITY));
    }
    assert_eq!(controller.bone_buffer().version(), 1);
}

#[test]
fn identity_pose_with_identity_bind_is_identity() {
    let mut builder = SkeletonBuilder::new("single");
    builder.add_bone("root", None, Mat4::IDENTITY);
    let mut controller = SkeletalAnimationController::new(Arc::new(builder.build().unwrap())).unwrap();

    controller.apply_pose(&[LocalPose::IDENTITY], false);
    assert!(approx_mat4(controller.skinning_matrices()[0], Mat4::IDENTITY));
}

#[test]
fn no_instance_applies_bind_pose() {
    let (mut controller, _) = controller_with_clip(3.0);
    controller.apply_animation(None, true);

    for matrix in controller.skinning_matrices() {
        assert!(approx_mat4(*matrix, Mat4::IDENTITY));
    }
    let buffer = controller.bone_buffer();
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.as_bytes().len(), 4 * 64);
}

#[test]
fn root_motion_propagates_to_children() {
    let (mut controller, clip) = controller_with_clip(2.0);
    let key = controller.create_animation(clip, 1.0, 1.0).unwrap();
    controller.apply_animation(Some(key), false);

    // Root sampled halfway: z = 2. Unanimated children use their rest pose
    // (identity), so every world matrix carries the root translation.
    for world in controller.world_matrices() {
        assert!(approx_vec3(world.w_axis.truncate(), Vec3::new(0.0, 0.0, 2.0)));
    }
}

#[test]
fn snapshots_refresh_in_place() {
    let (mut controller, clip) = controller_with_clip(2.0);
    let key = controller.create_animation(clip, 1.0, 0.0).unwrap();
    controller.apply_animation(Some(key), false);

    let mut snapshots = controller.retrieve_skeleton();
    assert_eq!(snapshots.len(), 4);
    assert_eq!(snapshots[1].name, "spine");
    assert_eq!(snapshots[1].children, vec![2, 3]);
    assert!(approx_vec3(snapshots[0].local.position, Vec3::ZERO));

    controller.update(2.0);
    controller.apply_animation(Some(key), false);
    controller.update_skeleton_values(&mut snapshots);
    assert!(approx_vec3(snapshots[0].local.position, Vec3::new(0.0, 0.0, 4.0)));
    assert_eq!(snapshots[0].skinning_matrix, controller.skinning_matrices()[0]);
}

#[test]
fn cpu_skinning_follows_bone() {
    let (mut controller, clip) = controller_with_clip(2.0);
    let key = controller.create_animation(clip, 1.0, 2.0).unwrap();
    controller.apply_animation(Some(key), false);

    let moved = controller.transform_vertex(Vec3::new(0.5, 0.5, 0.0), [0, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]);
    assert!(approx_vec3(moved, Vec3::new(0.5, 0.5, 4.0)));
}
