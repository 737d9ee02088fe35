//! Event dispatch system
//!
//! Every scheduling unit owns an [`EventEmitter`] and fires lifecycle events
//! through it. Handlers are reference counted so a dispatch can snapshot the
//! handler list and release its borrow before calling out. A handler is then
//! free to attach, detach, or drive other timers re-entrantly.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

new_key_type! {
    /// Handle to an attached event handler, used to detach it later
    pub struct HandlerId;
}

/// Event type identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stop,
    Pause,
    Complete,
    /// A queue or cycle wrapped around its sequence
    End,
    /// Any other event name, stored case-folded
    Custom(String),
}

impl EventKind {
    /// Map an event name to its kind (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        let folded = name.to_ascii_lowercase();
        match folded.as_str() {
            "start" => EventKind::Start,
            "stop" => EventKind::Stop,
            "pause" => EventKind::Pause,
            "complete" => EventKind::Complete,
            "end" => EventKind::End,
            _ => EventKind::Custom(folded),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Pause => "pause",
            EventKind::Complete => "complete",
            EventKind::End => "end",
            EventKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event fired by a scheduling unit
#[derive(Clone, Debug)]
pub struct AnimationEvent {
    pub kind: EventKind,
    /// Id of the unit that fired the event
    pub target: u64,
    /// Completed-sequence count, set on `end` events
    pub count: Option<u32>,
    stopped: bool,
}

impl AnimationEvent {
    pub fn new(kind: EventKind, target: u64) -> Self {
        Self {
            kind,
            target,
            count: None,
            stopped: false,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Prevent handlers attached after the current one from running
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Event handler function type
pub type EventHandler = Rc<dyn Fn(&mut AnimationEvent)>;

/// Wrap a closure as an [`EventHandler`]
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&mut AnimationEvent) + 'static,
{
    Rc::new(f)
}

#[derive(Default)]
struct HandlerTable {
    handlers: SlotMap<HandlerId, EventHandler>,
    order: FxHashMap<EventKind, SmallVec<[HandlerId; 2]>>,
}

/// Dispatches events to attached handlers in attach order
#[derive(Default)]
pub struct EventEmitter {
    table: RefCell<HandlerTable>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler for an event kind
    pub fn attach(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        let mut table = self.table.borrow_mut();
        let id = table.handlers.insert(handler);
        table.order.entry(kind).or_default().push(id);
        id
    }

    /// Detach one handler, or every handler of `kind` when `id` is `None`.
    ///
    /// Returns the number of handlers removed.
    pub fn detach(&self, kind: &EventKind, id: Option<HandlerId>) -> usize {
        let mut table = self.table.borrow_mut();
        let HandlerTable { handlers, order } = &mut *table;
        let Some(ids) = order.get_mut(kind) else {
            return 0;
        };

        let removed = match id {
            Some(id) => match ids.iter().position(|candidate| *candidate == id) {
                Some(pos) => {
                    ids.remove(pos);
                    handlers.remove(id);
                    1
                }
                None => 0,
            },
            None => {
                let count = ids.len();
                for id in ids.drain(..) {
                    handlers.remove(id);
                }
                count
            }
        };

        if ids.is_empty() {
            order.remove(kind);
        }
        removed
    }

    pub fn has_handlers(&self, kind: &EventKind) -> bool {
        self.handler_count(kind) > 0
    }

    pub fn handler_count(&self, kind: &EventKind) -> usize {
        self.table
            .borrow()
            .order
            .get(kind)
            .map_or(0, |ids| ids.len())
    }

    /// Dispatch an event to all handlers attached for its kind.
    ///
    /// The handler list is captured before the first handler runs, so
    /// handlers attached during dispatch only see later events. Returns
    /// `false` if a handler stopped the event.
    pub fn dispatch(&self, event: &mut AnimationEvent) -> bool {
        let snapshot: SmallVec<[EventHandler; 4]> = {
            let table = self.table.borrow();
            match table.order.get(&event.kind) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| table.handlers.get(*id).cloned())
                    .collect(),
                None => SmallVec::new(),
            }
        };

        for handler in snapshot {
            if event.is_stopped() {
                break;
            }
            handler(event);
        }

        !event.is_stopped()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.borrow();
        f.debug_struct("EventEmitter")
            .field("handlers", &table.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(EventKind::from_name("Complete"), EventKind::Complete);
        assert_eq!(EventKind::from_name("START"), EventKind::Start);
        assert_eq!(
            EventKind::from_name("Loaded"),
            EventKind::Custom("loaded".to_string())
        );
    }

    #[test]
    fn test_dispatch_in_attach_order() {
        let emitter = EventEmitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = log.clone();
            emitter.attach(EventKind::Start, handler(move |_| log.borrow_mut().push(tag)));
        }

        let mut event = AnimationEvent::new(EventKind::Start, 7);
        assert!(emitter.dispatch(&mut event));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stop_halts_later_handlers() {
        let emitter = EventEmitter::new();
        let calls = Rc::new(Cell::new(0));

        let first = calls.clone();
        emitter.attach(
            EventKind::Stop,
            handler(move |e| {
                first.set(first.get() + 1);
                e.stop();
            }),
        );
        let second = calls.clone();
        emitter.attach(EventKind::Stop, handler(move |_| second.set(second.get() + 1)));

        let mut event = AnimationEvent::new(EventKind::Stop, 1);
        assert!(!emitter.dispatch(&mut event));
        assert!(event.is_stopped());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_detach_single_and_all() {
        let emitter = EventEmitter::new();
        let a = emitter.attach(EventKind::Pause, handler(|_| {}));
        emitter.attach(EventKind::Pause, handler(|_| {}));
        emitter.attach(EventKind::Pause, handler(|_| {}));

        assert_eq!(emitter.detach(&EventKind::Pause, Some(a)), 1);
        assert_eq!(emitter.detach(&EventKind::Pause, Some(a)), 0);
        assert_eq!(emitter.handler_count(&EventKind::Pause), 2);

        assert_eq!(emitter.detach(&EventKind::Pause, None), 2);
        assert!(!emitter.has_handlers(&EventKind::Pause));
    }

    #[test]
    fn test_handler_may_attach_during_dispatch() {
        let emitter = Rc::new(EventEmitter::new());
        let late_calls = Rc::new(Cell::new(0));

        let emitter_clone = emitter.clone();
        let late = late_calls.clone();
        emitter.attach(
            EventKind::End,
            handler(move |_| {
                let late = late.clone();
                emitter_clone.attach(EventKind::End, handler(move |_| late.set(late.get() + 1)));
            }),
        );

        let mut event = AnimationEvent::new(EventKind::End, 1).with_count(1);
        emitter.dispatch(&mut event);
        // The handler attached mid-dispatch only sees the next event
        assert_eq!(late_calls.get(), 0);

        let mut event = AnimationEvent::new(EventKind::End, 1).with_count(2);
        emitter.dispatch(&mut event);
        assert_eq!(late_calls.get(), 1);
    }
}
