use slotmap::new_key_type;

use crate::clip::ClipId;
use crate::tracks::TrackCursors;

new_key_type! {
    /// Handle to an [`AnimationInstance`] owned by a controller.
    pub struct AnimationKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Stop at the end and report `finished`.
    #[default]
    Once,
    /// Wrap the playback time back into `[0, duration)`.
    Loop,
}

/// Runtime playback state of one clip.
///
/// `Playing -> Finished` is the only transition; it happens in `advance` once
/// the time reaches the clip duration under [`LoopMode::Once`].
#[derive(Debug, Clone)]
pub struct AnimationInstance {
    clip_id: ClipId,
    time: f32,
    duration: f32,
    finished: bool,

    pub speed: f32,
    pub loop_mode: LoopMode,
    pub paused: bool,

    pub(crate) cursors: Vec<TrackCursors>,
}

impl AnimationInstance {
    pub(crate) fn new(
        clip_id: ClipId,
        duration: f32,
        speed: f32,
        start_time: f32,
        loop_mode: LoopMode,
        bone_count: usize,
    ) -> Self {
        Self {
            clip_id,
            time: start_time,
            duration,
            finished: false,
            speed,
            loop_mode,
            paused: false,
            cursors: vec![TrackCursors::default(); bone_count],
        }
    }

    #[inline]
    #[must_use]
    pub fn clip_id(&self) -> ClipId {
        self.clip_id
    }

    /// Current playback time in the clip's unit.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Jumps to `time`; a finished instance becomes playable again when the
    /// new time lies before the end.
    pub fn seek(&mut self, time: f32) {
        self.time = time;
        if self.finished && time < self.duration {
            self.finished = false;
        }
    }

    /// `time += fps_scale * speed`, then wrap or finish at the clip boundary.
    pub(crate) fn advance(&mut self, fps_scale: f32) {
        if self.finished || self.paused {
            return;
        }

        self.time += fps_scale * self.speed;
        let duration = self.duration;

        match self.loop_mode {
            LoopMode::Once => {
                if self.time >= duration {
                    self.time = duration;
                    self.finished = true;
                } else if self.time < 0.0 {
                    // Reverse playback ran past the start
                    self.time = 0.0;
                    self.finished = true;
                }
            }
            LoopMode::Loop => {
                if duration <= 0.0 {
                    self.time = 0.0;
                } else if self.time >= duration || self.time < 0.0 {
                    self.time = self.time.rem_euclid(duration);
                    // rem_euclid may round up to `duration` for tiny negatives
                    if self.time >= duration {
                        self.time = 0.0;
                    }
                }
            }
        }
    }
}
