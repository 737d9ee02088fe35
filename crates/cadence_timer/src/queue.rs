//! Sequenced queues
//!
//! A queue is itself an [`Animation`]: it owns an ordered list of child
//! units and plays them one after another, moving on whenever the current
//! child fires `complete`. Since children are just units, queues nest.
//!
//! Children never sit in a registry of their own. The queue is the only
//! thing in the registry and forwards each tick to whichever child is
//! current, so a child handed to [`Queue::add`] is silently taken out of any
//! registry it was in.

use crate::animation::{default_options, Animation, AnimationBase, AnimationRef, Callback};
use crate::config::TimerConfig;
use crate::cycle::Cycle;
use crate::delay::Delay;
use crate::repeat::Repeat;
use crate::transition::Transition;
use cadence_core::error::Result;
use cadence_core::events::{handler, AnimationEvent, EventKind, HandlerId};
use cadence_core::lifecycle::AnimationState;
use cadence_core::options::keys;
use cadence_core::OptionBag;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct QueueEntry {
    unit: AnimationRef,
    /// Our `complete` subscription on the child
    handler: HandlerId,
}

#[derive(Debug, Default)]
struct QueueState {
    last_frame: Option<u64>,
    /// Index of the playing child; `None` before the first run
    current: Option<usize>,
    /// Full passes through the children
    completed: u32,
}

/// Plays child units in order, optionally looping the whole sequence
pub struct Queue {
    base: AnimationBase,
    me: Weak<Queue>,
    config: TimerConfig,
    children: RefCell<Vec<QueueEntry>>,
    state: RefCell<QueueState>,
}

impl Queue {
    /// Options: `loop` (passes before completing, default 1, 0 = forever)
    pub fn new(options: OptionBag, config: &TimerConfig) -> Rc<Self> {
        let defaults = default_options().with(keys::LOOP, 1);
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            base: AnimationBase::new(me.clone(), 0, Callback::None, defaults, options),
            me: me.clone(),
            config: *config,
            children: RefCell::new(Vec::new()),
            state: RefCell::new(QueueState::default()),
        })
    }

    /// Append a child unit.
    ///
    /// The child is stopped silently and leaves its registry, if it had one;
    /// from here on it only runs when the queue reaches it.
    pub fn add(&self, child: AnimationRef) -> &Self {
        if child.id() == self.id() {
            tracing::warn!(queue = self.id(), "refusing to add a queue to itself");
            return self;
        }

        child.stop_with(true);
        child.base().leave_timer_list();

        let queue = self.me.clone();
        let handler = child.attach(
            EventKind::Complete,
            handler(move |_| {
                if let Some(queue) = queue.upgrade() {
                    queue.next();
                }
            }),
        );
        tracing::trace!(queue = self.id(), child = child.id(), "child queued");
        self.children.borrow_mut().push(QueueEntry {
            unit: child,
            handler,
        });
        self
    }

    pub fn delay(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Delay>> {
        let delay = Delay::new(callback, duration, options)?;
        self.add(delay.clone());
        Ok(delay)
    }

    pub fn repeat(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Repeat>> {
        let repeat = Repeat::new(callback, duration, options, &self.config)?;
        self.add(repeat.clone());
        Ok(repeat)
    }

    pub fn transition(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Transition>> {
        let transition = Transition::new(callback, duration, options)?;
        self.add(transition.clone());
        Ok(transition)
    }

    pub fn cycle(
        &self,
        callback: Callback,
        duration: f64,
        options: OptionBag,
    ) -> Result<Rc<Cycle>> {
        let cycle = Cycle::new(callback, duration, options, &self.config)?;
        self.add(cycle.clone());
        Ok(cycle)
    }

    /// Append a nested queue
    pub fn queue(&self, options: OptionBag) -> Rc<Queue> {
        let queue = Queue::new(options, &self.config);
        self.add(queue.clone());
        queue
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    pub fn children(&self) -> Vec<AnimationRef> {
        self.children
            .borrow()
            .iter()
            .map(|entry| entry.unit.clone())
            .collect()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.borrow().current
    }

    pub fn completed_count(&self) -> u32 {
        self.state.borrow().completed
    }

    fn current_child(&self) -> Option<AnimationRef> {
        let index = self.state.borrow().current?;
        self.children
            .borrow()
            .get(index)
            .map(|entry| entry.unit.clone())
    }

    /// Move to the next child, wrapping or completing past the last one.
    ///
    /// Every wrap fires `end` with the number of finished passes.
    pub fn next(&self) {
        if !self.is_playing() {
            return;
        }
        let len = self.len();
        if len == 0 {
            return;
        }

        let (index, wrapped) = {
            let mut state = self.state.borrow_mut();
            let index = state.current.map_or(0, |i| i + 1);
            if index >= len {
                state.completed += 1;
                (0, Some(state.completed))
            } else {
                (index, None)
            }
        };

        if let Some(count) = wrapped {
            tracing::trace!(queue = self.id(), count, "queue pass finished");
            self.base
                .fire_event(AnimationEvent::new(EventKind::End, self.id()).with_count(count));
            if !self.is_playing() {
                return;
            }
            let limit = self.base.count_option(keys::LOOP, 1);
            if limit > 0 && count >= limit {
                self.complete();
                return;
            }
        }

        self.state.borrow_mut().current = Some(index);
        if let Some(child) = self.current_child() {
            // A child left mid-flight by an earlier pass starts over
            rewind_child(&child, false);
            child.start();
        }
    }

    /// Drop every child and clear run-state
    pub fn remove_all(&self) {
        self.reset();
        let removed = std::mem::take(&mut *self.children.borrow_mut());
        tracing::debug!(queue = self.id(), count = removed.len(), "removing all children");
        for entry in removed {
            entry
                .unit
                .detach(&EventKind::Complete, Some(entry.handler));
        }
    }

    /// Drop the children after the current one.
    ///
    /// The current child keeps running; the sequence ends after it.
    pub fn remove_after(&self) {
        let keep = self.state.borrow().current.map_or(0, |i| i + 1);
        let removed = {
            let mut children = self.children.borrow_mut();
            if keep >= children.len() {
                return;
            }
            children.split_off(keep)
        };
        tracing::debug!(queue = self.id(), count = removed.len(), "removing queued children");
        for entry in removed {
            entry
                .unit
                .detach(&EventKind::Complete, Some(entry.handler));
            entry.unit.stop_with(true);
        }
    }
}

impl Animation for Queue {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn run(&self, frame: u64, frame_duration: u64) {
        if self.is_empty() {
            return;
        }

        let first = {
            let mut state = self.state.borrow_mut();
            match state.last_frame {
                Some(last) if frame < last => None,
                _ => {
                    state.last_frame = Some(frame);
                    Some(state.current.is_none())
                }
            }
        };

        match first {
            None => {
                tracing::debug!(queue = self.id(), frame, "frame rewound, resetting queue");
                self.reset();
                return;
            }
            Some(true) => self.next(),
            Some(false) => {}
        }

        if let Some(child) = self.current_child() {
            if child.is_playing() {
                child.run(frame, frame_duration);
            }
        }
    }

    fn reset(&self) {
        let current = self.current_child();
        *self.state.borrow_mut() = QueueState::default();
        if let Some(child) = current {
            rewind_child(&child, true);
        }
    }
}

/// Stop `child` and clear its run-state, even when it was left paused
fn rewind_child(child: &AnimationRef, silent: bool) {
    child.stop_with(silent);
    if child.state() != AnimationState::Idle {
        child.base().force_idle();
        child.reset();
    }
}
