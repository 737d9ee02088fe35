//! Timer service
//!
//! The entry point the render loop talks to. A service owns (or is handed)
//! one [`TimerList`], forwards every tick to it, and builds units that are
//! registered with it on creation.
//!
//! ```
//! use cadence_core::OptionBag;
//! use cadence_timer::{Animation, Callback, TimerConfig, TimerService};
//!
//! let service = TimerService::new(TimerConfig::default());
//! let delay = service
//!     .delay(Callback::None, 32.0, OptionBag::new())
//!     .unwrap();
//! assert!(delay.is_playing());
//!
//! for frame in 0..4 {
//!     service.run(frame, 16);
//! }
//! assert!(!delay.is_playing());
//! ```

use crate::animation::{Animation, Callback};
use crate::config::TimerConfig;
use crate::cycle::Cycle;
use crate::delay::Delay;
use crate::queue::Queue;
use crate::repeat::Repeat;
use crate::timer_list::TimerList;
use crate::transition::Transition;
use cadence_core::error::Result;
use cadence_core::OptionBag;
use std::rc::Rc;

/// Factory and tick entry point for every timer of one driving loop
pub struct TimerService {
    timers: Rc<TimerList>,
    config: TimerConfig,
}

impl TimerService {
    /// Create a service with its own registry
    pub fn new(config: TimerConfig) -> Self {
        Self::with_timer_list(Rc::new(TimerList::new()), config)
    }

    /// Create a service over an existing registry
    pub fn with_timer_list(timers: Rc<TimerList>, config: TimerConfig) -> Self {
        tracing::debug!(fps = config.fps, "timer service created");
        Self { timers, config }
    }

    pub fn timer_list(&self) -> &Rc<TimerList> {
        &self.timers
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Advance every playing timer by one tick
    pub fn run(&self, frame: u64, frame_duration: u64) {
        self.timers.run(frame, frame_duration);
    }

    /// Stop every playing timer, firing their `stop` events
    pub fn stop_all(&self) {
        self.timers.stop_all();
    }

    /// Drop every timer without events
    pub fn remove_all(&self) {
        self.timers.remove_all();
    }

    /// Number of timers currently playing
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn delay(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Delay>> {
        let delay = Delay::new(callback, duration, options)?;
        delay.set_timer_list(&self.timers);
        Ok(delay)
    }

    pub fn repeat(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Repeat>> {
        let repeat = Repeat::new(callback, duration, options, &self.config)?;
        repeat.set_timer_list(&self.timers);
        Ok(repeat)
    }

    pub fn transition(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Transition>> {
        let transition = Transition::new(callback, duration, options)?;
        transition.set_timer_list(&self.timers);
        Ok(transition)
    }

    pub fn cycle(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Cycle>> {
        let cycle = Cycle::new(callback, duration, options, &self.config)?;
        cycle.set_timer_list(&self.timers);
        Ok(cycle)
    }

    /// Create a queue. Children are added through the returned handle and
    /// start playing on the next tick.
    pub fn queue(&self, options: OptionBag) -> Rc<Queue> {
        let queue = Queue::new(options, &self.config);
        queue.set_timer_list(&self.timers);
        queue
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
