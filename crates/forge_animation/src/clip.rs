use log::warn;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::skeleton::SkeletonHierarchy;
use crate::tracks::BoneKeyframeTrack;

/// Index of a clip inside a controller.
pub type ClipId = usize;

/// One named skeletal animation: a keyframe track per animated bone.
///
/// Clips are immutable once built and are shared read-only (`Arc`) between
/// every instance that plays them.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    /// Length in the clip's time unit (ticks or seconds).
    pub duration: f32,
    /// Playback rate the clip was authored for.
    pub ticks_per_second: f32,
    tracks: FxHashMap<usize, BoneKeyframeTrack>,
    skeleton_id: Option<Uuid>,
}

impl AnimationClip {
    #[must_use]
    pub fn new(
        name: &str,
        duration: f32,
        tracks: impl IntoIterator<Item = (usize, BoneKeyframeTrack)>,
    ) -> Self {
        let mut map = FxHashMap::default();
        for (bone_id, track) in tracks {
            if map.insert(bone_id, track).is_some() {
                warn!("AnimationClip '{name}': duplicate track for bone {bone_id}, keeping the last one");
            }
        }

        Self {
            name: name.to_string(),
            duration,
            ticks_per_second: 1.0,
            tracks: map,
            skeleton_id: None,
        }
    }

    /// Derives the duration from the latest keyframe of any channel.
    #[must_use]
    pub fn from_tracks(
        name: &str,
        tracks: impl IntoIterator<Item = (usize, BoneKeyframeTrack)>,
    ) -> Self {
        let mut clip = Self::new(name, 0.0, tracks);
        clip.duration = clip
            .tracks
            .values()
            .filter_map(BoneKeyframeTrack::end_time)
            .fold(0.0_f32, f32::max);
        clip
    }

    /// Resolves tracks addressed by bone name against `skeleton`.
    ///
    /// Tracks whose bone does not exist in the skeleton are dropped.
    #[must_use]
    pub fn from_named_tracks(
        name: &str,
        duration: f32,
        tracks: impl IntoIterator<Item = (String, BoneKeyframeTrack)>,
        skeleton: &SkeletonHierarchy,
    ) -> Self {
        let resolved = tracks.into_iter().filter_map(|(bone_name, track)| {
            if let Some(bone) = skeleton.bone_by_name(&bone_name) {
                Some((bone.id(), track))
            } else {
                warn!(
                    "AnimationClip '{name}': bone '{bone_name}' not found in skeleton '{}', track dropped",
                    skeleton.name()
                );
                None
            }
        });

        let mut clip = Self::new(name, duration, resolved);
        clip.skeleton_id = Some(skeleton.id());
        clip
    }

    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks_per_second: f32) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    pub(crate) fn with_skeleton_id(mut self, skeleton_id: Uuid) -> Self {
        self.skeleton_id = Some(skeleton_id);
        self
    }

    #[inline]
    #[must_use]
    pub fn track(&self, bone_id: usize) -> Option<&BoneKeyframeTrack> {
        self.tracks.get(&bone_id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (usize, &BoneKeyframeTrack)> {
        self.tracks.iter().map(|(&id, track)| (id, track))
    }

    #[inline]
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Skeleton the tracks were resolved against, if any.
    #[inline]
    #[must_use]
    pub fn skeleton_id(&self) -> Option<Uuid> {
        self.skeleton_id
    }
}
