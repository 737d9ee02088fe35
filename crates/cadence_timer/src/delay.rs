//! One-shot delay

use crate::animation::{default_options, Animation, AnimationBase, Callback};
use cadence_core::error::{coerce_duration, Result};
use cadence_core::OptionBag;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Default)]
struct DelayState {
    /// Last frame index seen; `None` until the first run
    last_frame: Option<u64>,
    start_frame: u64,
    running_time: u64,
    /// Callback already ran; a resumed delay only completes
    fired: bool,
}

/// Fires its callback once after `duration` milliseconds, then completes
pub struct Delay {
    base: AnimationBase,
    state: RefCell<DelayState>,
}

impl Delay {
    pub fn new(callback: Callback, duration: f64, options: OptionBag) -> Result<Rc<Self>> {
        let duration = coerce_duration(duration)?;
        Ok(Rc::new_cyclic(|me: &Weak<Self>| Self {
            base: AnimationBase::new(me.clone(), duration, callback, default_options(), options),
            state: RefCell::new(DelayState::default()),
        }))
    }

    /// Frame index of the first tick this delay saw
    pub fn start_frame(&self) -> Option<u64> {
        let state = self.state.borrow();
        state.last_frame.map(|_| state.start_frame)
    }

    pub fn running_time(&self) -> u64 {
        self.state.borrow().running_time
    }
}

impl Animation for Delay {
    fn base(&self) -> &AnimationBase {
        &self.base
    }

    fn run(&self, frame: u64, frame_duration: u64) {
        let due = {
            let mut state = self.state.borrow_mut();
            let last_frame = state.last_frame;
            match last_frame {
                // The driving loop was restarted
                Some(last) if frame < last => None,
                Some(_) => {
                    state.last_frame = Some(frame);
                    state.running_time += frame_duration;
                    Some(state.running_time >= self.duration() as u64)
                }
                None => {
                    // First tick only establishes the baseline
                    state.start_frame = frame;
                    state.last_frame = Some(frame);
                    state.running_time = 0;
                    Some(self.duration() == 0)
                }
            }
        };

        match due {
            None => {
                tracing::debug!(timer = self.id(), frame, "frame rewound, resetting delay");
                self.reset();
            }
            Some(false) => {}
            Some(true) => {
                let (running_time, fired) = {
                    let mut state = self.state.borrow_mut();
                    (state.running_time, std::mem::replace(&mut state.fired, true))
                };
                if !fired {
                    if let Some(payload) = self.base.payload(frame, running_time) {
                        self.trigger_callback(&payload);
                    }
                }
                self.complete();
            }
        }
    }

    fn reset(&self) {
        *self.state.borrow_mut() = DelayState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer_list::TimerList;
    use cadence_core::events::{handler, EventKind};
    use std::cell::{Cell, RefCell};

    fn counting_delay(duration: f64, fired: Rc<RefCell<Vec<u64>>>) -> Rc<Delay> {
        Delay::new(
            Callback::function(move |p| fired.borrow_mut().push(p.frame)),
            duration,
            OptionBag::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_fires_once_when_duration_reached() {
        let list = Rc::new(TimerList::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let delay = counting_delay(50.0, fired.clone());
        delay.set_timer_list(&list);
        assert!(delay.is_playing());

        // The first tick's duration is never charged
        for frame in 0..5 {
            list.run(frame, 16);
        }
        // 16 * 3 = 48 after frame 3, 64 after frame 4
        assert_eq!(*fired.borrow(), vec![4]);
        assert!(!delay.is_playing());
        assert!(list.is_empty());

        for frame in 5..10 {
            list.run(frame, 16);
        }
        assert_eq!(fired.borrow().len(), 1);
    }

    #[test]
    fn test_complete_fires_without_stop() {
        let list = Rc::new(TimerList::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        let delay = Delay::new(Callback::None, 0.0, OptionBag::new()).unwrap();
        for kind in [EventKind::Start, EventKind::Stop, EventKind::Complete] {
            let events = events.clone();
            delay.attach(kind, handler(move |e| events.borrow_mut().push(e.kind.clone())));
        }

        delay.set_timer_list(&list);
        list.run(0, 16);

        assert_eq!(*events.borrow(), vec![EventKind::Start, EventKind::Complete]);
    }

    #[test]
    fn test_rewind_resets_without_firing() {
        let list = Rc::new(TimerList::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let delay = counting_delay(40.0, fired.clone());
        delay.set_timer_list(&list);

        list.run(10, 16);
        list.run(11, 16);
        assert_eq!(delay.running_time(), 16);

        // Loop restarted at frame 0
        list.run(0, 30);
        assert!(fired.borrow().is_empty());
        assert_eq!(delay.running_time(), 0);
        assert_eq!(delay.start_frame(), None);

        // Treated as a fresh delay from here on
        list.run(1, 30);
        list.run(2, 30);
        assert!(fired.borrow().is_empty());
        list.run(3, 30);
        assert_eq!(*fired.borrow(), vec![3]);
    }

    #[test]
    fn test_pause_keeps_progress() {
        let list = Rc::new(TimerList::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let delay = counting_delay(30.0, fired.clone());
        delay.set_timer_list(&list);

        list.run(0, 10);
        list.run(1, 20);
        delay.pause();
        assert!(list.is_empty());
        list.run(2, 20);
        assert_eq!(delay.running_time(), 20);

        delay.start();
        list.run(3, 10);
        assert_eq!(*fired.borrow(), vec![3]);
    }

    #[test]
    fn test_callback_stopping_itself_is_safe() {
        let list = Rc::new(TimerList::new());
        let stops = Rc::new(Cell::new(0));
        let delay = Delay::new(
            Callback::function(|p| p.timer.stop()),
            0.0,
            OptionBag::new(),
        )
        .unwrap();
        let stops_clone = stops.clone();
        delay.attach(
            EventKind::Stop,
            handler(move |_| stops_clone.set(stops_clone.get() + 1)),
        );
        delay.set_timer_list(&list);

        list.run(0, 16);
        assert_eq!(stops.get(), 1);
        assert!(!delay.is_playing());
        assert!(list.is_empty());
    }

    #[test]
    fn test_rejects_invalid_duration() {
        assert!(Delay::new(Callback::None, f64::NAN, OptionBag::new()).is_err());
        let delay = Delay::new(Callback::None, 12.9, OptionBag::new()).unwrap();
        assert_eq!(delay.duration(), 12);
        delay.set_duration(99.5).unwrap();
        assert_eq!(delay.duration(), 99);
    }

    #[test]
    fn test_paused_from_callback_fires_once() {
        let list = Rc::new(TimerList::new());
        let fires = Rc::new(Cell::new(0));
        let fires_clone = fires.clone();
        let delay = Delay::new(
            Callback::function(move |p| {
                fires_clone.set(fires_clone.get() + 1);
                p.timer.pause();
            }),
            16.0,
            OptionBag::new(),
        )
        .unwrap();
        let completes = Rc::new(Cell::new(0));
        let completes_clone = completes.clone();
        delay.attach(
            EventKind::Complete,
            handler(move |_| completes_clone.set(completes_clone.get() + 1)),
        );
        delay.set_timer_list(&list);

        list.run(0, 16);
        list.run(1, 16);
        assert_eq!(fires.get(), 1);
        assert_eq!(completes.get(), 0);
        assert!(!delay.is_playing());

        delay.start();
        list.run(2, 16);
        assert_eq!(fires.get(), 1);
        assert_eq!(completes.get(), 1);
        assert!(!delay.is_playing());
        assert!(list.is_empty());
    }
}
