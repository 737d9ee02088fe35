//! Value transitions
//!
//! Interpolates from `from` to `to` over `duration` milliseconds, handing
//! the eased value to its callback every tick. Combined with an attribute
//! binding this drives external state without a callback function.

use crate::animation::{default_options, Animation, AnimationBase, Callback, TimerValue};
use crate::easing::Easing;
use cadence_core::error::{coerce_duration, Result, TimerError};
use cadence_core::options::keys;
use cadence_core::OptionBag;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Default)]
struct TransitionState {
    last_frame: Option<u64>,
    running_time: u64,
    passes: u32,
    /// Final pass fired; completes on the next run
    done: bool,
}

/// Interpolates values over a fixed duration
pub struct Transition {
    base: AnimationBase,
    from: Vec<f64>,
    to: Vec<f64>,
    easing: Easing,
    state: RefCell<TransitionState>,
}

impl Transition {
    /// Options: `from`/`to` (number or equal-length lists, default 0 and 1),
    /// `easing` (curve name, default linear), `loop` (passes, default 1,
    /// 0 = forever)
    pub fn new(callback: Callback, duration: f64, options: OptionBag) -> Result<Rc<Self>> {
        let duration = coerce_duration(duration)?;
        let from = options.numbers(keys::FROM)?.unwrap_or_else(|| vec![0.0]);
        let to = options.numbers(keys::TO)?.unwrap_or_else(|| vec![1.0]);
        if from.len() != to.len() || from.is_empty() {
            return Err(TimerError::InvalidOption {
                name: keys::TO.to_string(),
                expected: "as many values as `from`",
            });
        }

        let easing = match options.get(keys::EASING) {
            None => Easing::Linear,
            Some(value) => value
                .as_text()
                .and_then(Easing::from_name)
                .ok_or_else(|| TimerError::InvalidOption {
                    name: keys::EASING.to_string(),
                    expected: "a known easing name",
                })?,
        };

        let defaults = default_options().with(keys::LOOP, 1);
        Ok(Rc::new_cyclic(|me: &Weak<Self>| Self {
            base: AnimationBase::new(me.clone(), duration, callback, defaults, options),
            from,
            to,
            easing,
            state: RefCell::new(TransitionState::default()),
        }))
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Value at `progress` in `[0, 1]`
    pub fn value_at(&self, progress: f64) -> TimerValue {
        let eased = self.easing.apply(progress);
        let values = self
            .from
            .iter()
            .zip(&self.to)
            .map(|(from, to)| from + (to - from) * eased)
            .collect();
        TimerValue::from_values(values)
    }
}

impl Animation for Transition {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn run(&self, frame: u64, frame_duration: u64) {
        if self.state.borrow().done {
            // The last pass already fired; the unit was paused before completing
            self.complete();
            return;
        }

        let step = {
            let mut state = self.state.borrow_mut();
            let last_frame = state.last_frame;
            if matches!(last_frame, Some(last) if frame < last) {
                None
            } else {
                if last_frame.is_some() {
                    state.running_time += frame_duration;
                } else {
                    state.running_time = 0;
                }
                state.last_frame = Some(frame);

                let running_time = state.running_time;
                let duration = u64::from(self.duration());
                let progress = if duration == 0 {
                    1.0
                } else {
                    (running_time as f64 / duration as f64).min(1.0)
                };
                if progress >= 1.0 {
                    state.passes += 1;
                    let limit = self.base.count_option(keys::LOOP, 1);
                    if limit == 0 || state.passes < limit {
                        state.running_time = 0;
                    } else {
                        state.done = true;
                    }
                }
                Some((progress, running_time, state.passes, state.done))
            }
        };

        let Some((progress, running_time, passes, done)) = step else {
            tracing::debug!(timer = self.id(), frame, "frame rewound, resetting transition");
            self.reset();
            return;
        };

        if let Some(mut payload) = self.base.payload(frame, running_time) {
            payload.count = passes;
            payload.progress = progress;
            payload.value = Some(self.value_at(progress));
            self.trigger_callback(&payload);
        }

        if done && self.is_playing() {
            self.complete();
        }
    }

    fn reset(&self) {
        *self.state.borrow_mut() = TransitionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer_list::TimerList;
    use cadence_core::events::{handler, EventKind};
    use cadence_core::lifecycle::AnimationState;
    use cadence_core::{AttributeBag, AttributeTarget, TimerError};
    use std::cell::Cell;

    #[test]
    fn test_linear_values_per_tick() {
        let list = Rc::new(TimerList::new());
        let values = Rc::new(RefCell::new(Vec::new()));
        let values_clone = values.clone();
        let options = OptionBag::new()
            .with(keys::FROM, 0.0)
            .with(keys::TO, 100.0);
        let transition = Transition::new(
            Callback::function(move |p| {
                values_clone
                    .borrow_mut()
                    .push(p.value.as_ref().and_then(TimerValue::as_scalar).unwrap())
            }),
            100.0,
            options,
        )
        .unwrap();
        transition.set_timer_list(&list);

        for frame in 0..6 {
            list.run(frame, 25);
        }

        assert_eq!(*values.borrow(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert!(!transition.is_playing());
    }

    #[test]
    fn test_binds_list_values_to_attributes() {
        let list = Rc::new(TimerList::new());
        let target = Rc::new(AttributeBag::new());
        let options = OptionBag::new()
            .with(keys::FROM, vec![0.0, 10.0])
            .with(keys::TO, vec![50.0, 20.0])
            .with(keys::SET, vec!["x", "y"]);
        let transition =
            Transition::new(Callback::bind(target.clone()), 50.0, options).unwrap();
        transition.set_timer_list(&list);

        list.run(0, 0);
        list.run(1, 25);
        assert_eq!(target.get("x"), Some(25.0));
        assert_eq!(target.get("y"), Some(15.0));

        list.run(2, 25);
        assert_eq!(target.get("x"), Some(50.0));
        assert_eq!(target.get("y"), Some(20.0));
    }

    #[test]
    fn test_scalar_binds_every_attribute_of_every_target() {
        let list = Rc::new(TimerList::new());
        let a = Rc::new(AttributeBag::new());
        let b = Rc::new(AttributeBag::new());
        let options = OptionBag::new()
            .with(keys::TO, 1.0)
            .with(keys::SET, vec!["opacity", "scale"]);
        let transition = Transition::new(
            Callback::bind_all(vec![
                a.clone() as Rc<dyn AttributeTarget>,
                b.clone() as Rc<dyn AttributeTarget>,
            ]),
            0.0,
            options,
        )
        .unwrap();
        transition.set_timer_list(&list);
        list.run(0, 16);

        for target in [&a, &b] {
            assert_eq!(target.get("opacity"), Some(1.0));
            assert_eq!(target.get("scale"), Some(1.0));
        }
    }

    #[test]
    fn test_loop_restarts_from_start() {
        let list = Rc::new(TimerList::new());
        let passes = Rc::new(RefCell::new(Vec::new()));
        let passes_clone = passes.clone();
        let options = OptionBag::new().with(keys::LOOP, 2);
        let transition = Transition::new(
            Callback::function(move |p| {
                if p.progress >= 1.0 {
                    passes_clone.borrow_mut().push(p.frame);
                }
            }),
            50.0,
            options,
        )
        .unwrap();
        transition.set_timer_list(&list);

        for frame in 0..10 {
            list.run(frame, 25);
        }
        assert_eq!(*passes.borrow(), vec![2, 4]);
        assert!(!transition.is_playing());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let options = OptionBag::new()
            .with(keys::FROM, vec![0.0, 1.0])
            .with(keys::TO, 5.0);
        assert!(matches!(
            Transition::new(Callback::None, 10.0, options),
            Err(TimerError::InvalidOption { .. })
        ));

        let options = OptionBag::new().with(keys::EASING, "wobble");
        assert!(Transition::new(Callback::None, 10.0, options).is_err());
    }

    #[test]
    fn test_final_pass_fires_once_across_pause() {
        let list = Rc::new(TimerList::new());
        let fires = Rc::new(Cell::new(0));
        let fires_clone = fires.clone();
        let transition = Transition::new(
            Callback::function(move |p| {
                fires_clone.set(fires_clone.get() + 1);
                if p.progress >= 1.0 {
                    p.timer.pause();
                }
            }),
            50.0,
            OptionBag::new(),
        )
        .unwrap();
        let completes = Rc::new(Cell::new(0));
        let completes_clone = completes.clone();
        transition.attach(
            EventKind::Complete,
            handler(move |_| completes_clone.set(completes_clone.get() + 1)),
        );
        transition.set_timer_list(&list);

        list.run(0, 25);
        list.run(1, 25);
        list.run(2, 25);
        assert_eq!(fires.get(), 3);
        assert_eq!(transition.state(), AnimationState::Paused);

        transition.start();
        list.run(3, 25);
        list.run(4, 25);
        assert_eq!(fires.get(), 3);
        assert_eq!(completes.get(), 1);
        assert!(!transition.is_playing());
    }
}
