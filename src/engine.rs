//! Engine Frame Loop
//!
//! [`Engine`] bundles the per-frame collaborators and runs them in the fixed
//! order the core expects:
//!
//! 1. tick the [`FrameClock`] and derive the fps scale
//! 2. update the scene graph and every animation controller
//! 3. for each configured render pass: cull and queue requests, then dispatch
//!    them to the actors
//!
//! The engine owns no window and no GPU; all rendering goes through the
//! [`RenderContext`], which records the resulting commands.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use forge::Engine;
//!
//! let mut engine = Engine::default();
//! // ... populate engine.scene and engine.actors ...
//! loop {
//!     let stats = engine.frame(Duration::from_millis(16));
//!     for command in engine.context.take_commands() {
//!         // replay on a backend
//!     }
//! }
//! ```

use std::time::Duration;

use log::trace;

use forge_core::settings::{FrameSettings, RenderSettings};
use forge_core::time::FrameClock;
use forge_scene::{ActorRegistry, RenderContext, RenderPass, SceneGraph};

/// Counts of one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub requests: usize,
    pub draw_calls: usize,
}

pub struct Engine {
    pub clock: FrameClock,
    pub scene: SceneGraph,
    pub actors: ActorRegistry,
    pub context: RenderContext,

    passes: Vec<RenderPass>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(FrameSettings::default(), RenderSettings::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(frame_settings: FrameSettings, render_settings: RenderSettings) -> Self {
        Self {
            clock: FrameClock::new(frame_settings),
            scene: SceneGraph::new(),
            actors: ActorRegistry::new(),
            context: RenderContext::new(render_settings),
            passes: vec![RenderPass::Shadow, RenderPass::Geometry, RenderPass::Forward],
        }
    }

    /// Passes rendered by [`render`](Self::render), in order.
    pub fn set_passes(&mut self, passes: Vec<RenderPass>) {
        self.passes = passes;
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    /// Advances time by `delta` and updates transforms and animations.
    /// Returns the fps scale used.
    pub fn update(&mut self, delta: Duration) -> f32 {
        let fps_scale = self.clock.tick_with(delta);
        self.update_scaled(fps_scale);
        fps_scale
    }

    /// Updates with an explicit fps scale, bypassing the clock.
    pub fn update_scaled(&mut self, fps_scale: f32) {
        self.scene.update(fps_scale);
        self.actors.update(fps_scale);
    }

    /// Renders every configured pass.
    pub fn render(&mut self) -> FrameStats {
        let draws_before = self.context.draw_call_count();
        let mut stats = FrameStats::default();

        for &pass in &self.passes {
            self.context.set_active_pass(pass);
            self.scene.render(&self.actors, &mut self.context);

            let requests = self.context.take_requests();
            stats.requests += requests.len();
            self.actors.dispatch(&mut self.context, &requests);
        }

        stats.draw_calls = self.context.draw_call_count() - draws_before;
        trace!(
            "Frame {}: {} requests, {} draw calls",
            self.clock.frame_count, stats.requests, stats.draw_calls
        );
        stats
    }

    /// `update` followed by `render`.
    pub fn frame(&mut self, delta: Duration) -> FrameStats {
        self.update(delta);
        self.render()
    }
}
