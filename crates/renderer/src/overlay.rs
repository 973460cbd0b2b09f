//! UI overlay hook appended to every render pass.

use showcase_core::FrameTiming;
use tracing::info;

use crate::FrameSlot;
use crate::error::RendererResult;
use crate::recorder::CommandRecorder;

/// Draws diagnostic UI into the technique's render pass.
pub trait UiOverlay {
    /// Appends overlay commands. Called inside the open render pass, after
    /// the technique's own draws.
    fn record(&mut self, recorder: &mut dyn CommandRecorder, slot: FrameSlot)
    -> RendererResult<()>;

    /// Called once the frame has been fully recorded.
    fn frame_finished(&mut self, _timing: &FrameTiming) {}
}

/// Overlay that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl UiOverlay for NoOverlay {
    fn record(&mut self, _: &mut dyn CommandRecorder, _: FrameSlot) -> RendererResult<()> {
        Ok(())
    }
}

/// Frame statistics reported through the log once per second.
///
/// Records no GPU commands, so it is safe for headless runs.
#[derive(Debug, Default, Clone)]
pub struct StatsOverlay {
    window_start: f32,
    frames_in_window: u32,
    fps: Option<f32>,
    last_frame_ms: f32,
}

impl StatsOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames per second over the last full one-second window.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn last_frame_ms(&self) -> f32 {
        self.last_frame_ms
    }
}

impl UiOverlay for StatsOverlay {
    fn record(&mut self, _: &mut dyn CommandRecorder, _: FrameSlot) -> RendererResult<()> {
        Ok(())
    }

    fn frame_finished(&mut self, timing: &FrameTiming) {
        self.frames_in_window += 1;
        self.last_frame_ms = timing.delta * 1000.0;

        let window = timing.elapsed - self.window_start;
        if window >= 1.0 {
            let fps = self.frames_in_window as f32 / window;
            info!(
                "{:.1} fps ({:.2} ms/frame, frame {})",
                fps, self.last_frame_ms, timing.frame_number
            );
            self.fps = Some(fps);
            self.frames_in_window = 0;
            self.window_start = timing.elapsed;
        }
    }
}
