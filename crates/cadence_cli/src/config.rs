//! Scenario file handling (cadence.toml)

use anyhow::{Context, Result};
use cadence_core::error::parse_duration;
use cadence_core::options::keys;
use cadence_core::OptionBag;
use cadence_timer::TimerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level scenario: one driving loop and the timers it runs
#[derive(Debug, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(rename = "loop", default)]
    pub driver: LoopConfig,
    #[serde(default)]
    pub timers: Vec<TimerEntry>,
}

/// The synthetic render loop
#[derive(Debug, Deserialize, Serialize)]
pub struct LoopConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Number of ticks to drive
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Milliseconds reported for an ordinary tick
    #[serde(default = "default_frame_duration")]
    pub frame_duration: u64,
    /// Ticks that report a longer duration
    #[serde(default)]
    pub stalls: Vec<Stall>,
    /// Tick at which the frame index restarts from 0
    #[serde(default)]
    pub rewind_at: Option<u64>,
}

fn default_fps() -> u32 {
    60
}

fn default_frames() -> u64 {
    120
}

fn default_frame_duration() -> u64 {
    16
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            frames: default_frames(),
            frame_duration: default_frame_duration(),
            stalls: Vec::new(),
            rewind_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Stall {
    pub frame: u64,
    pub duration: u64,
}

impl LoopConfig {
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::with_fps(self.fps)
    }

    /// Frame index and duration reported on tick `tick`
    pub fn tick(&self, tick: u64) -> (u64, u64) {
        let frame = match self.rewind_at {
            Some(at) if tick >= at => tick - at,
            _ => tick,
        };
        let duration = self
            .stalls
            .iter()
            .find(|stall| stall.frame == tick)
            .map_or(self.frame_duration, |stall| stall.duration);
        (frame, duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Delay,
    Repeat,
    Transition,
    Cycle,
    Queue,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::Delay => "delay",
            TimerKind::Repeat => "repeat",
            TimerKind::Transition => "transition",
            TimerKind::Cycle => "cycle",
            TimerKind::Queue => "queue",
        }
    }
}

/// A number or a list of numbers
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Numbers {
    One(f64),
    Many(Vec<f64>),
}

impl Numbers {
    fn to_vec(&self) -> Vec<f64> {
        match self {
            Numbers::One(v) => vec![*v],
            Numbers::Many(values) => values.clone(),
        }
    }
}

/// Milliseconds as a number, or text such as `"250ms"`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DurationValue {
    Millis(f64),
    Text(String),
}

impl Default for DurationValue {
    fn default() -> Self {
        DurationValue::Millis(0.0)
    }
}

impl DurationValue {
    pub fn millis(&self) -> cadence_core::Result<f64> {
        match self {
            DurationValue::Millis(ms) => Ok(*ms),
            DurationValue::Text(text) => parse_duration(text).map(f64::from),
        }
    }
}

/// One `[[timers]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimerEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: TimerKind,
    /// The interval for repeats
    #[serde(default)]
    pub duration: DurationValue,
    #[serde(rename = "loop", default)]
    pub loop_count: Option<u32>,
    #[serde(default)]
    pub before_delay: Option<u32>,
    #[serde(default)]
    pub use_real_time: Option<bool>,
    #[serde(default)]
    pub from: Option<Numbers>,
    #[serde(default)]
    pub to: Option<Numbers>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub easing: Option<String>,
    /// Children of a queue, in order
    #[serde(default)]
    pub steps: Vec<TimerEntry>,
}

impl TimerEntry {
    /// Display name, falling back to the kind and position
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}#{}", self.kind.name(), index),
        }
    }

    /// Translate the entry into unit options
    pub fn options(&self) -> OptionBag {
        let mut options = OptionBag::new();
        if let Some(count) = self.loop_count {
            options.set(keys::LOOP, count);
        }
        if let Some(ms) = self.before_delay {
            options.set(keys::BEFORE_DELAY, ms);
        }
        if let Some(real_time) = self.use_real_time {
            options.set(keys::USE_REAL_TIME, real_time);
        }
        if let Some(from) = &self.from {
            options.set(keys::FROM, from.to_vec());
        }
        if let Some(to) = &self.to {
            options.set(keys::TO, to.to_vec());
        }
        if let Some(step) = self.step {
            options.set(keys::STEP, step);
        }
        if let Some(values) = &self.values {
            options.set(keys::VALUES, values.clone());
        }
        if let Some(easing) = &self.easing {
            options.set(keys::EASING, easing.as_str());
        }
        options
    }
}

/// Structural problems in a scenario that parse cleanly
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("`loop.fps` must be greater than zero")]
    ZeroFps,

    #[error("`loop.rewind_at` ({rewind_at}) is past the last frame ({frames})")]
    RewindOutOfRange { rewind_at: u64, frames: u64 },

    #[error("queue `{0}` has no steps")]
    EmptyQueue(String),

    #[error("`{0}` is not a queue but declares steps")]
    UnexpectedSteps(String),
}

impl Scenario {
    /// Load a scenario from a file, or from `cadence.toml` in a directory
    pub fn load(path: &Path) -> Result<Self> {
        let scenario_path = if path.is_dir() {
            path.join("cadence.toml")
        } else {
            path.to_path_buf()
        };

        if !scenario_path.exists() {
            anyhow::bail!("No scenario found at {}", scenario_path.display());
        }

        let content = fs::read_to_string(&scenario_path)
            .with_context(|| format!("Failed to read {}", scenario_path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", scenario_path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        Ok(scenario)
    }

    /// Check the structure without building any timers
    pub fn validate(&self) -> std::result::Result<(), ScenarioError> {
        if self.driver.fps == 0 {
            return Err(ScenarioError::ZeroFps);
        }
        if let Some(rewind_at) = self.driver.rewind_at {
            if rewind_at >= self.driver.frames {
                return Err(ScenarioError::RewindOutOfRange {
                    rewind_at,
                    frames: self.driver.frames,
                });
            }
        }
        for (index, entry) in self.timers.iter().enumerate() {
            validate_entry(entry, &entry.label(index))?;
        }
        Ok(())
    }
}

fn validate_entry(entry: &TimerEntry, label: &str) -> std::result::Result<(), ScenarioError> {
    match (entry.kind, entry.steps.is_empty()) {
        (TimerKind::Queue, true) => Err(ScenarioError::EmptyQueue(label.to_string())),
        (TimerKind::Queue, false) => {
            for (index, step) in entry.steps.iter().enumerate() {
                validate_entry(step, &format!("{label}/{}", step.label(index)))?;
            }
            Ok(())
        }
        (_, false) => Err(ScenarioError::UnexpectedSteps(label.to_string())),
        (_, true) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
[loop]
fps = 30
frames = 90
stalls = [{ frame = 10, duration = 500 }]
rewind_at = 60

[[timers]]
name = "blink"
kind = "repeat"
duration = 250
loop = 4

[[timers]]
kind = "queue"
loop = 0

[[timers.steps]]
kind = "delay"
duration = "100ms"

[[timers.steps]]
kind = "transition"
duration = 200
from = [0, 0]
to = [10, 20]
easing = "easeOutCubic"
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.driver.fps, 30);
        assert_eq!(scenario.driver.frame_duration, 16);
        assert_eq!(scenario.timers.len(), 2);
        assert_eq!(scenario.timers[0].kind, TimerKind::Repeat);
        assert_eq!(scenario.timers[1].steps.len(), 2);
        assert_eq!(scenario.timers[1].label(1), "queue#1");
        assert_eq!(scenario.timers[0].duration.millis(), Ok(250.0));
        assert_eq!(scenario.timers[1].steps[0].duration.millis(), Ok(100.0));
        scenario.validate().unwrap();
    }

    #[test]
    fn test_loop_defaults() {
        let scenario = Scenario::parse("").unwrap();
        assert_eq!(scenario.driver.fps, 60);
        assert_eq!(scenario.driver.frames, 120);
        assert!(scenario.timers.is_empty());
    }

    #[test]
    fn test_tick_applies_stalls_and_rewind() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.driver.tick(9), (9, 16));
        assert_eq!(scenario.driver.tick(10), (10, 500));
        assert_eq!(scenario.driver.tick(59), (59, 16));
        assert_eq!(scenario.driver.tick(60), (0, 16));
        assert_eq!(scenario.driver.tick(61), (1, 16));
    }

    #[test]
    fn test_options_translation() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let options = scenario.timers[0].options();
        assert_eq!(options.count_or(keys::LOOP, 0), 4);
        assert!(!options.contains(keys::BEFORE_DELAY));

        let transition = &scenario.timers[1].steps[1];
        let options = transition.options();
        assert_eq!(options.numbers(keys::TO).unwrap(), Some(vec![10.0, 20.0]));
        assert_eq!(
            options.get(keys::EASING).and_then(|v| v.as_text()),
            Some("easeOutCubic")
        );
    }

    #[test]
    fn test_validate_rejects_bad_structure() {
        let scenario = Scenario::parse("[[timers]]\nkind = \"queue\"\n").unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::EmptyQueue(_))
        ));

        let scenario = Scenario::parse(
            "[[timers]]\nkind = \"delay\"\n[[timers.steps]]\nkind = \"delay\"\n",
        )
        .unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UnexpectedSteps(_))
        ));

        let scenario = Scenario::parse("[loop]\nframes = 10\nrewind_at = 10\n").unwrap();
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        assert!(Scenario::parse("[[timers]]\nkind = \"tween\"\n").is_err());
    }
}
