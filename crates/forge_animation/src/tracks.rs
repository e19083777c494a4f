use glam::{Quat, Vec3};

use crate::pose::LocalPose;
use crate::values::Interpolatable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    #[default]
    Linear,
    Step,
}

const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the last keyframe interval found so that forward playback
/// resolves the next lookup in O(1).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// One channel of `(time, value)` keyframes with ascending timestamps.
#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: InterpolationMode,
}

impl<T: Interpolatable> Default for KeyframeTrack<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        debug_assert_eq!(times.len(), values.len(), "keyframe times/values length mismatch");
        Self {
            times,
            values,
            interpolation,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            interpolation: InterpolationMode::Linear,
        }
    }

    /// Linear track from `(time, value)` pairs.
    #[must_use]
    pub fn from_keyframes(keyframes: impl IntoIterator<Item = (f32, T)>) -> Self {
        let (times, values) = keyframes.into_iter().unzip();
        Self::new(times, values, InterpolationMode::Linear)
    }

    /// Number of usable keyframes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the last keyframe.
    #[must_use]
    pub fn end_time(&self) -> Option<f32> {
        self.times.get(self.len().checked_sub(1)?).copied()
    }

    /// Samples without cursor caching.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        let mut cursor = KeyframeCursor::default();
        self.sample_with_cursor(time, &mut cursor)
    }

    /// Samples the channel at `time`.
    ///
    /// Returns `None` for an empty channel. Times before the first or after the
    /// last keyframe clamp to the boundary value; a time exactly on a keyframe
    /// returns that keyframe's value unchanged.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }

        if len == 1 || time <= self.times[0] {
            cursor.last_index = 0;
            return Some(self.values[0]);
        }

        if time >= self.times[len - 1] {
            cursor.last_index = len - 1;
            return Some(self.values[len - 1]);
        }

        let index = self.locate(time, cursor);
        Some(self.sample_at_frame(index, time))
    }

    /// Finds `index` with `times[index] <= time < times[index + 1]`.
    /// Requires `len >= 2` and `times[0] < time < times[len - 1]`.
    fn locate(&self, time: f32, cursor: &mut KeyframeCursor) -> usize {
        let len = self.len();
        let i = cursor.last_index.min(len - 2);

        let found = if time >= self.times[i] {
            // Forward playback: scan a few intervals ahead
            (i..(i + MAX_SCAN_OFFSET + 1).min(len - 1)).find(|&idx| time < self.times[idx + 1])
        } else {
            // Reverse playback or loop reset: scan a few intervals back
            (1..=MAX_SCAN_OFFSET.min(i))
                .map(|offset| i - offset)
                .find(|&idx| time >= self.times[idx])
        };

        let index = found.unwrap_or_else(|| {
            // Large jump, fall back to binary search
            let next_idx = self.times[..len].partition_point(|&t| t <= time);
            next_idx.saturating_sub(1).min(len - 2)
        });

        cursor.last_index = index;
        index
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> T {
        let next_idx = index + 1;
        let t0 = self.times[index];
        let t1 = self.times[next_idx];
        let dt = t1 - t0;

        let alpha = if dt > 1e-6 { (time - t0) / dt } else { 0.0 };
        let alpha = alpha.clamp(0.0, 1.0);

        let v0 = self.values[index];
        if alpha <= 0.0 {
            return v0;
        }

        match self.interpolation {
            InterpolationMode::Step => v0,
            InterpolationMode::Linear => T::interpolate_linear(v0, self.values[next_idx], alpha),
        }
    }
}

/// Per-channel cursors for one [`BoneKeyframeTrack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackCursors {
    pub position: KeyframeCursor,
    pub rotation: KeyframeCursor,
    pub scale: KeyframeCursor,
}

/// Keyframes of one bone.
///
/// The three channels are independent: they may differ in length and in
/// timestamps, and each is searched and interpolated on its own.
#[derive(Debug, Clone, Default)]
pub struct BoneKeyframeTrack {
    pub positions: KeyframeTrack<Vec3>,
    pub rotations: KeyframeTrack<Quat>,
    pub scalings: KeyframeTrack<Vec3>,
}

impl BoneKeyframeTrack {
    #[must_use]
    pub fn new(
        positions: KeyframeTrack<Vec3>,
        rotations: KeyframeTrack<Quat>,
        scalings: KeyframeTrack<Vec3>,
    ) -> Self {
        Self {
            positions,
            rotations,
            scalings,
        }
    }

    /// Latest timestamp over all channels.
    #[must_use]
    pub fn end_time(&self) -> Option<f32> {
        [
            self.positions.end_time(),
            self.rotations.end_time(),
            self.scalings.end_time(),
        ]
        .into_iter()
        .flatten()
        .reduce(f32::max)
    }

    #[must_use]
    pub fn sample(&self, time: f32, fallback: &LocalPose) -> LocalPose {
        let mut cursors = TrackCursors::default();
        self.sample_with_cursors(time, &mut cursors, fallback)
    }

    /// Samples every channel at `time`. A channel without keyframes takes its
    /// value from `fallback` (the bone's rest pose); the other channels are
    /// unaffected.
    pub fn sample_with_cursors(
        &self,
        time: f32,
        cursors: &mut TrackCursors,
        fallback: &LocalPose,
    ) -> LocalPose {
        LocalPose {
            position: self
                .positions
                .sample_with_cursor(time, &mut cursors.position)
                .unwrap_or(fallback.position),
            rotation: self
                .rotations
                .sample_with_cursor(time, &mut cursors.rotation)
                .unwrap_or(fallback.rotation),
            scale: self
                .scalings
                .sample_with_cursor(time, &mut cursors.scale)
                .unwrap_or(fallback.scale),
        }
    }
}
