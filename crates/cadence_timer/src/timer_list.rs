//! Active timer registry
//!
//! Holds every playing unit and dispatches `run` to each of them once per
//! tick. Units add and remove themselves through their back-reference
//! while a dispatch is in progress, so `run` walks a snapshot taken before
//! the first unit runs:
//!
//! - units added during the pass are not visited until the next tick
//! - units stopped during the pass are skipped when their turn comes
//! - entries found not playing are pruned instead of dispatched

use crate::animation::AnimationRef;
use smallvec::SmallVec;
use std::cell::RefCell;

/// The ordered collection of currently-playing units
///
/// Units are dispatched newest first (reverse of registration).
#[derive(Default)]
pub struct TimerList {
    /// Registration order, oldest first
    entries: RefCell<Vec<AnimationRef>>,
}

impl TimerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Returns `false` if it is already present.
    pub fn add(&self, unit: AnimationRef) -> bool {
        let mut entries = self.entries.borrow_mut();
        let id = unit.id();
        if entries.iter().any(|entry| entry.id() == id) {
            return false;
        }
        tracing::trace!(timer = id, "timer registered");
        entries.push(unit);
        true
    }

    /// Remove the unit with `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|entry| entry.id() == id) {
            Some(pos) => {
                entries.remove(pos);
                tracing::trace!(timer = id, "timer unregistered");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|entry| entry.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Ids in dispatch order
    pub fn ids(&self) -> Vec<u64> {
        self.entries.borrow().iter().rev().map(|e| e.id()).collect()
    }

    /// Drop every entry without firing events.
    ///
    /// Units fall back to idle with cleared run-state so they can be started
    /// again later.
    pub fn remove_all(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        tracing::debug!(count = entries.len(), "removing all timers");
        for unit in entries {
            unit.base().force_idle();
            unit.reset();
        }
    }

    /// Stop every entry, firing each unit's `stop` event
    pub fn stop_all(&self) {
        let snapshot = self.snapshot();
        tracing::debug!(count = snapshot.len(), "stopping all timers");
        for unit in snapshot {
            unit.stop();
        }
    }

    /// Dispatch one tick to every playing unit
    pub fn run(&self, frame: u64, frame_duration: u64) {
        for unit in self.snapshot() {
            if !unit.is_playing() {
                self.remove(unit.id());
                continue;
            }
            // Moved to another registry mid-pass
            if !self.contains(unit.id()) {
                continue;
            }
            unit.run(frame, frame_duration);
        }
    }

    fn snapshot(&self) -> SmallVec<[AnimationRef; 16]> {
        self.entries.borrow().iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, Callback};
    use crate::delay::Delay;
    use cadence_core::events::{handler, EventKind};
    use cadence_core::options::keys;
    use cadence_core::OptionBag;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn idle_delay() -> Rc<Delay> {
        let options = OptionBag::new().with(keys::USE_AUTO_START, false);
        Delay::new(Callback::None, 1000.0, options).unwrap()
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let list = TimerList::new();
        let delay = idle_delay();
        assert!(list.add(delay.clone()));
        assert!(!list.add(delay.clone()));
        assert_eq!(list.len(), 1);

        assert!(list.remove(delay.id()));
        assert!(!list.remove(delay.id()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_dispatch_is_newest_first() {
        let list = Rc::new(TimerList::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = order.clone();
            let delay = Delay::new(
                Callback::function(move |p| order.borrow_mut().push(p.timer.id())),
                0.0,
                OptionBag::new(),
            )
            .unwrap();
            delay.set_timer_list(&list);
            ids.push(delay.id());
        }

        list.run(0, 16);

        ids.reverse();
        assert_eq!(*order.borrow(), ids);
        assert!(list.is_empty());
    }

    #[test]
    fn test_units_added_mid_pass_wait_for_next_tick() {
        let list = Rc::new(TimerList::new());
        let late = Delay::new(Callback::None, 1000.0, OptionBag::new()).unwrap();
        let late_starts = Rc::new(Cell::new(0));
        let late_clone = late.clone();
        let starts = late_starts.clone();
        late.attach(EventKind::Start, handler(move |_| starts.set(starts.get() + 1)));

        let list_clone = list.clone();
        let spawner = Delay::new(
            Callback::function(move |_| late_clone.set_timer_list(&list_clone)),
            0.0,
            OptionBag::new(),
        )
        .unwrap();
        spawner.set_timer_list(&list);

        list.run(0, 16);
        assert_eq!(late_starts.get(), 1);
        assert!(list.contains(late.id()));
        assert_eq!(late.start_frame(), None);

        list.run(1, 16);
        assert_eq!(late.start_frame(), Some(1));
    }

    #[test]
    fn test_idle_entries_are_pruned() {
        let list = Rc::new(TimerList::new());
        let delay = idle_delay();
        list.add(delay.clone());

        list.run(0, 16);
        assert!(list.is_empty());
        assert_eq!(delay.start_frame(), None);
    }

    #[test]
    fn test_remove_all_is_silent() {
        let list = Rc::new(TimerList::new());
        let stops = Rc::new(Cell::new(0));
        let delay = Delay::new(Callback::None, 100.0, OptionBag::new()).unwrap();
        let stops_clone = stops.clone();
        delay.attach(
            EventKind::Stop,
            handler(move |_| stops_clone.set(stops_clone.get() + 1)),
        );
        delay.set_timer_list(&list);
        list.run(0, 16);
        list.run(1, 16);

        list.remove_all();
        assert!(list.is_empty());
        assert!(!delay.is_playing());
        assert_eq!(delay.running_time(), 0);
        assert_eq!(stops.get(), 0);

        list.stop_all();
        assert_eq!(stops.get(), 0);
        delay.start();
        list.stop_all();
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_unit_moves_between_registries() {
        let first = Rc::new(TimerList::new());
        let second = Rc::new(TimerList::new());
        let starts = Rc::new(Cell::new(0));
        let delay = Delay::new(Callback::None, 1000.0, OptionBag::new()).unwrap();
        let starts_clone = starts.clone();
        delay.attach(
            EventKind::Start,
            handler(move |_| starts_clone.set(starts_clone.get() + 1)),
        );

        delay.set_timer_list(&first);
        assert!(first.contains(delay.id()));

        delay.set_timer_list(&second);
        assert!(!first.contains(delay.id()));
        assert!(second.contains(delay.id()));
        assert!(delay.is_playing());
        assert_eq!(starts.get(), 1);

        // Stopping only touches the registry it is in now
        delay.stop();
        assert!(second.is_empty());
        first.run(0, 16);
        assert!(first.is_empty());
    }
}

