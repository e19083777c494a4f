use std::time::{Duration, Instant};

use crate::settings::FrameSettings;

/// Frame clock producing the per-frame `fps_scale` factor.
///
/// `fps_scale = target_fps / current_fps`, i.e. the number of target-rate
/// frames that elapsed since the previous tick. It is passed explicitly into
/// every `update()` call.
#[derive(Debug, Clone)]
pub struct FrameClock {
    settings: FrameSettings,
    start_time: Instant,
    last_update: Instant,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
    fps_scale: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(FrameSettings::default())
    }
}

impl FrameClock {
    #[must_use]
    pub fn new(settings: FrameSettings) -> Self {
        let now = Instant::now();
        Self {
            settings,
            start_time: now,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            fps_scale: 1.0,
        }
    }

    /// Measures the wall-clock delta since the previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now - self.last_update;
        self.last_update = now;
        self.elapsed = now - self.start_time;
        self.advance(delta)
    }

    /// Advances by an injected delta (fixed-step loops, tests, replays).
    pub fn tick_with(&mut self, delta: Duration) -> f32 {
        self.elapsed += delta;
        self.advance(delta)
    }

    fn advance(&mut self, delta: Duration) -> f32 {
        self.delta = delta;
        self.frame_count += 1;
        self.fps_scale = fps_scale_from_delta(delta, &self.settings);
        self.fps_scale
    }

    #[must_use]
    pub fn fps_scale(&self) -> f32 {
        self.fps_scale
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[must_use]
    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }
}

/// `delta * target_fps`, clamped to `max_fps_scale` when configured.
#[must_use]
pub fn fps_scale_from_delta(delta: Duration, settings: &FrameSettings) -> f32 {
    let scale = delta.as_secs_f32() * settings.target_fps;
    match settings.max_fps_scale {
        Some(max) => scale.min(max),
        None => scale,
    }
}

/// Once-per-second frame rate estimate.
pub struct FpsCounter {
    frame_count: u32,
    accumulated_time: Duration,
    pub current_fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            accumulated_time: Duration::ZERO,
            current_fps: 0.0,
        }
    }

    /// Records one frame of length `delta`. Returns the new estimate whenever
    /// a full second has accumulated.
    pub fn update(&mut self, delta: Duration) -> Option<f32> {
        self.frame_count += 1;
        self.accumulated_time += delta;

        if self.accumulated_time.as_secs_f32() >= 1.0 {
            self.current_fps = self.frame_count as f32 / self.accumulated_time.as_secs_f32();
            self.accumulated_time = Duration::ZERO;
            self.frame_count = 0;
            return Some(self.current_fps);
        }

        None
    }
}
