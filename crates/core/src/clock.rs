//! Frame clock producing per-frame timing snapshots.

use std::time::{Duration, Instant};

/// Timing information handed to a technique for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTiming {
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Seconds since the clock started.
    pub elapsed: f32,
    /// Monotonic frame counter, starting at 0.
    pub frame_number: u64,
}

impl FrameTiming {
    /// Builds a timing snapshot from fixed values, used by headless runs.
    pub fn fixed(frame_number: u64, delta: f32) -> Self {
        Self {
            delta,
            elapsed: delta * frame_number as f32,
            frame_number,
        }
    }
}

/// High-resolution clock for the render loop.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    frame_number: u64,
}

impl FrameClock {
    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_number: 0,
        }
    }

    /// Get the total elapsed time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Advance by one frame and return its timing.
    ///
    /// The first call reports frame 0.
    pub fn tick(&mut self) -> FrameTiming {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;

        let timing = FrameTiming {
            delta: delta.as_secs_f32(),
            elapsed: (now - self.start).as_secs_f32(),
            frame_number: self.frame_number,
        };
        self.frame_number += 1;
        timing
    }

    /// Number of frames ticked so far.
    pub fn frames(&self) -> u64 {
        self.frame_number
    }

    /// Reset the clock to the current time and frame 0.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.frame_number = 0;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
