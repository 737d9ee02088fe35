//! Stepped value cycles
//!
//! Steps through a list of values at a fixed interval, such as sprite frame
//! indices. One cycle through every value takes `duration` milliseconds.
//! Dropped frames skip values rather than slowing the cycle down.

use crate::animation::{default_options, Animation, AnimationBase, Callback, TimerValue};
use crate::config::TimerConfig;
use cadence_core::error::{coerce_duration, Result, TimerError};
use cadence_core::events::{AnimationEvent, EventKind};
use cadence_core::options::keys;
use cadence_core::OptionBag;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Upper bound on values generated from `from`/`to`/`step`
const MAX_GENERATED_VALUES: f64 = 1_000_000.0;

#[derive(Debug, Default)]
struct CycleState {
    last_frame: Option<u64>,
    running_time: u64,
    last_fire_time: u64,
    /// Total steps taken, including skipped ones
    position: u64,
    cycles: u32,
    fresh: bool,
}

enum Step {
    Rewound,
    Idle,
    Fire {
        position: u64,
        cycles: u32,
        wrapped: bool,
        skipped_count: u32,
        running_time: u64,
    },
}

/// Steps through values, one per interval
pub struct Cycle {
    base: AnimationBase,
    values: Vec<f64>,
    min_interval: u32,
    state: RefCell<CycleState>,
}

impl Cycle {
    /// Options: `values` (explicit list) or `from`/`to`/`step` (default
    /// step 1), `loop` (cycles before completing, default 0 = forever)
    pub fn new(
        callback: Callback,
        duration: f64,
        options: OptionBag,
        config: &TimerConfig,
    ) -> Result<Rc<Self>> {
        let duration = coerce_duration(duration)?;
        let values = cycle_values(&options)?;
        if values.is_empty() {
            return Err(TimerError::EmptyCycle);
        }

        let defaults = default_options().with(keys::LOOP, 0);
        Ok(Rc::new_cyclic(|me: &Weak<Self>| Self {
            base: AnimationBase::new(me.clone(), duration, callback, defaults, options),
            values,
            min_interval: config.min_frame_duration(),
            state: RefCell::new(CycleState::default()),
        }))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Time each value is held
    pub fn interval(&self) -> u32 {
        let per_value = self.duration() / self.values.len().max(1) as u32;
        per_value.max(self.min_interval)
    }

    /// Completed passes through the values
    pub fn cycles(&self) -> u32 {
        self.state.borrow().cycles
    }

    fn step(&self, frame: u64, frame_duration: u64) -> Step {
        let mut state = self.state.borrow_mut();
        let last_frame = state.last_frame;
        if matches!(last_frame, Some(last) if frame < last) {
            return Step::Rewound;
        }

        let mut frame_duration = frame_duration;
        if last_frame.is_none() {
            state.running_time = 0;
            state.last_fire_time = 0;
            state.position = 0;
            state.fresh = true;
            frame_duration = 0;
        }
        state.last_frame = Some(frame);
        state.running_time += frame_duration;

        let interval = u64::from(self.interval());
        let elapsed = state.running_time - state.last_fire_time;
        let skipped = (elapsed / interval).max(1) - 1;
        let due = state.fresh || state.last_fire_time + interval <= state.running_time;
        if !due {
            return Step::Idle;
        }

        let advance = if state.fresh { 0 } else { 1 + skipped };
        state.fresh = false;
        state.position += advance;
        state.last_fire_time = state.running_time;

        let cycles = u32::try_from(state.position / self.values.len() as u64).unwrap_or(u32::MAX);
        let wrapped = cycles > state.cycles;
        state.cycles = cycles;

        Step::Fire {
            position: state.position,
            cycles,
            wrapped,
            skipped_count: u32::try_from(skipped).unwrap_or(u32::MAX),
            running_time: state.running_time,
        }
    }
}

fn cycle_values(options: &OptionBag) -> Result<Vec<f64>> {
    if let Some(values) = options.numbers(keys::VALUES)? {
        return Ok(values);
    }

    let from = options.number_or(keys::FROM, 0.0);
    let to = options.number_or(keys::TO, from);
    let step = options.number_or(keys::STEP, 1.0).abs();
    let span = (to - from).abs();
    if !from.is_finite() || !to.is_finite() || !step.is_finite() || step == 0.0 {
        return Err(TimerError::InvalidOption {
            name: keys::STEP.to_string(),
            expected: "finite `from`/`to` and a non-zero `step`",
        });
    }
    if span / step > MAX_GENERATED_VALUES {
        return Err(TimerError::InvalidOption {
            name: keys::STEP.to_string(),
            expected: "a step large enough for the `from`..`to` range",
        });
    }

    let direction = if to < from { -1.0 } else { 1.0 };
    let count = (span / step).floor() as usize + 1;
    Ok((0..count)
        .map(|i| from + direction * step * i as f64)
        .collect())
}

impl Animation for Cycle {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn run(&self, frame: u64, frame_duration: u64) {
        let (position, cycles, wrapped, skipped_count, running_time) =
            match self.step(frame, frame_duration) {
                Step::Rewound => {
                    tracing::debug!(timer = self.id(), frame, "frame rewound, resetting cycle");
                    self.reset();
                    return;
                }
                Step::Idle => return,
                Step::Fire {
                    position,
                    cycles,
                    wrapped,
                    skipped_count,
                    running_time,
                } => (position, cycles, wrapped, skipped_count, running_time),
            };

        if wrapped {
            self.base
                .fire_event(AnimationEvent::new(EventKind::End, self.id()).with_count(cycles));
            if !self.is_playing() {
                return;
            }
        }

        let limit = self.base.count_option(keys::LOOP, 0);
        if limit > 0 && cycles >= limit {
            self.complete();
            return;
        }

        let index = (position % self.values.len() as u64) as usize;
        if let Some(mut payload) = self.base.payload(frame, running_time) {
            payload.count = u32::try_from(position + 1).unwrap_or(u32::MAX);
            payload.skipped_count = skipped_count;
            payload.value = Some(TimerValue::Scalar(self.values[index]));
            self.trigger_callback(&payload);
        }
    }

    fn reset(&self) {
        *self.state.borrow_mut() = CycleState::default();
    }
}
