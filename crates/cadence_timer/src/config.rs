//! Timer configuration

use serde::{Deserialize, Serialize};

/// Settings describing the render loop that drives the timers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimerConfig {
    /// Frames per second of the driving loop
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_fps() -> u32 {
    60
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

impl TimerConfig {
    pub fn with_fps(fps: u32) -> Self {
        Self { fps }
    }

    /// Shortest tick the loop produces, in whole milliseconds.
    ///
    /// Repeating intervals are never allowed below this. At least 1ms so an
    /// interval can always divide elapsed time.
    pub fn min_frame_duration(&self) -> u32 {
        (1000 / self.fps.max(1)).max(1)
    }
}
