//! Fixed-interval repeat with drift compensation
//!
//! A repeat fires on its first tick and then every `duration` milliseconds.
//! When a single tick covers several intervals (a stalled frame, a hidden
//! window) the intervals are coalesced into one fire: `skipped_count`
//! reports how many were absorbed and, with `useRealTime`, the fire count
//! advances by all of them so per-fire work can catch up.

use crate::animation::{default_options, Animation, AnimationBase, Callback};
use crate::config::TimerConfig;
use cadence_core::error::{coerce_duration, Result};
use cadence_core::options::keys;
use cadence_core::OptionBag;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Default)]
struct RepeatState {
    last_frame: Option<u64>,
    start_frame: u64,
    running_time: u64,
    last_fire_frame: u64,
    last_fire_time: u64,
    count: u32,
    /// Remaining wait before the first fire
    before_delay: u64,
    /// Re-establish baselines on the next tick
    rebaseline: bool,
    /// Baselines were just established; fire on this tick
    fresh: bool,
}

enum Step {
    Rewound,
    Idle,
    Fire {
        count: u32,
        skipped_count: u32,
        running_time: u64,
    },
}

/// Fires its callback every `duration` milliseconds
pub struct Repeat {
    base: AnimationBase,
    min_interval: u32,
    state: RefCell<RepeatState>,
}

impl Repeat {
    /// Options: `beforeDelay` (ms, default 0), `loop` (fires before
    /// completing, 0 = forever), `useRealTime` (default true)
    pub fn new(
        callback: Callback,
        duration: f64,
        options: OptionBag,
        config: &TimerConfig,
    ) -> Result<Rc<Self>> {
        let min_interval = config.min_frame_duration();
        let requested = coerce_duration(duration)?;
        let duration = clamp_interval(requested, min_interval);

        let defaults = default_options()
            .with(keys::BEFORE_DELAY, 0)
            .with(keys::LOOP, 0)
            .with(keys::USE_REAL_TIME, true);

        let repeat = Rc::new_cyclic(|me: &Weak<Self>| Self {
            base: AnimationBase::new(me.clone(), duration, callback, defaults, options),
            min_interval,
            state: RefCell::new(RepeatState::default()),
        });
        repeat.reset();
        Ok(repeat)
    }

    /// Number of fires so far, including coalesced intervals
    pub fn count(&self) -> u32 {
        self.state.borrow().count
    }

    pub fn running_time(&self) -> u64 {
        self.state.borrow().running_time
    }

    /// Frame index of the most recent fire
    pub fn last_fire_frame(&self) -> Option<u64> {
        let state = self.state.borrow();
        (state.count > 0).then_some(state.last_fire_frame)
    }

    fn step(&self, frame: u64, frame_duration: u64) -> Step {
        let mut state = self.state.borrow_mut();
        let last_frame = state.last_frame;
        if matches!(last_frame, Some(last) if frame < last) {
            return Step::Rewound;
        }

        let mut frame_duration = frame_duration;
        if last_frame.is_none() || state.rebaseline {
            state.rebaseline = false;
            state.start_frame = frame;
            state.running_time = 0;
            state.last_fire_time = 0;
            state.fresh = true;
            frame_duration = 0;
        }
        state.last_frame = Some(frame);

        if state.count == 0 && state.before_delay > 0 {
            state.running_time += frame_duration;
            if state.running_time >= state.before_delay {
                state.before_delay = 0;
                state.rebaseline = true;
            }
            state.fresh = false;
            return Step::Idle;
        }

        state.running_time += frame_duration;
        let interval = u64::from(self.duration().max(1));
        let elapsed = state.running_time - state.last_fire_time;
        let skipped = (elapsed / interval).max(1) - 1;

        let due = state.fresh || state.last_fire_time + interval <= state.running_time;
        if !due {
            return Step::Idle;
        }

        state.fresh = false;
        let skipped_count = u32::try_from(skipped).unwrap_or(u32::MAX);
        let increment = if self.base.bool_option(keys::USE_REAL_TIME, true) {
            skipped_count.saturating_add(1)
        } else {
            1
        };
        state.count = state.count.saturating_add(increment);
        state.last_fire_frame = frame;
        state.last_fire_time = state.running_time;

        Step::Fire {
            count: state.count,
            skipped_count,
            running_time: state.running_time,
        }
    }
}

fn clamp_interval(requested: u32, min_interval: u32) -> u32 {
    if requested < min_interval {
        tracing::debug!(
            requested,
            min_interval,
            "repeat interval shorter than one frame, clamping"
        );
    }
    requested.max(min_interval)
}

impl Animation for Repeat {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn run(&self, frame: u64, frame_duration: u64) {
        match self.step(frame, frame_duration) {
            Step::Rewound => {
                tracing::debug!(timer = self.id(), frame, "frame rewound, resetting repeat");
                self.reset();
            }
            Step::Idle => {}
            Step::Fire {
                count,
                skipped_count,
                running_time,
            } => {
                if let Some(mut payload) = self.base.payload(frame, running_time) {
                    payload.count = count;
                    payload.skipped_count = skipped_count;
                    self.trigger_callback(&payload);
                }

                // The callback may have stopped or paused us
                if !self.is_playing() {
                    return;
                }
                let limit = self.base.count_option(keys::LOOP, 0);
                if limit > 0 && count >= limit {
                    self.complete();
                }
            }
        }
    }

    fn reset(&self) {
        let before_delay = self.base.count_option(keys::BEFORE_DELAY, 0);
        *self.state.borrow_mut() = RepeatState {
            before_delay: u64::from(before_delay),
            ..RepeatState::default()
        };
    }

    fn clamp_duration(&self, ms: u32) -> u32 {
        clamp_interval(ms, self.min_interval)
    }
}
