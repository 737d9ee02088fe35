//! Animation base
//!
//! Every scheduling unit implements [`Animation`]: it owns an
//! [`AnimationBase`] (identity, lifecycle, duration, callback, options,
//! events, registry back-reference) and supplies its own `run` and `reset`.
//! The lifecycle operations (`start`, `stop`, `pause`, `complete`) are
//! provided methods shared by every unit.
//!
//! Units are always handed out as `Rc`s. The base keeps a weak pointer to
//! its own unit so `start` can insert it into the registry, and a weak
//! pointer to the registry so `stop` can take it back out.

use crate::timer_list::TimerList;
use cadence_core::error::{coerce_duration, Result};
use cadence_core::events::{AnimationEvent, EventEmitter, EventHandler, EventKind, HandlerId};
use cadence_core::lifecycle::{AnimationState, LifecycleEvent, LifecycleMachine};
use cadence_core::options::{keys, OptionBag, OptionValue};
use cadence_core::AttributeTarget;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to any scheduling unit
pub type AnimationRef = Rc<dyn Animation>;

/// A value produced by a unit that interpolates or steps through values
#[derive(Clone, Debug, PartialEq)]
pub enum TimerValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl TimerValue {
    /// Build a scalar for one-element input, a list otherwise
    pub fn from_values(values: Vec<f64>) -> Self {
        match values.as_slice() {
            [single] => TimerValue::Scalar(*single),
            _ => TimerValue::List(values),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            TimerValue::Scalar(v) => Some(*v),
            TimerValue::List(_) => None,
        }
    }
}

/// What a unit hands its callback when it fires
///
/// `count` and `skipped_count` are filled by repeating units, `value` and
/// `progress` by units that produce values.
pub struct TimerPayload {
    pub timer: AnimationRef,
    pub frame: u64,
    pub duration: u32,
    pub running_time: u64,
    pub count: u32,
    pub skipped_count: u32,
    pub progress: f64,
    pub value: Option<TimerValue>,
}

/// Callback function type
pub type TimerCallback = Rc<dyn Fn(&TimerPayload)>;

/// How a unit reacts when it fires
#[derive(Clone, Default)]
pub enum Callback {
    #[default]
    None,
    /// Call a function with the payload
    Function(TimerCallback),
    /// Write the payload value onto attributes of the targets
    Bind {
        targets: Vec<Rc<dyn AttributeTarget>>,
        attributes: Vec<String>,
    },
}

impl Callback {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&TimerPayload) + 'static,
    {
        Callback::Function(Rc::new(f))
    }

    /// Bind to one target; attribute names come from the `set` option
    pub fn bind(target: Rc<dyn AttributeTarget>) -> Self {
        Self::bind_all(vec![target])
    }

    /// Bind to several targets; attribute names come from the `set` option
    pub fn bind_all(targets: Vec<Rc<dyn AttributeTarget>>) -> Self {
        Callback::Bind {
            targets,
            attributes: Vec::new(),
        }
    }

    /// Settle attribute names once, at construction
    fn resolve(self, options: &OptionBag) -> Self {
        match self {
            Callback::Bind {
                targets,
                attributes,
            } if attributes.is_empty() => {
                let attributes = options.texts(keys::SET).unwrap_or_default();
                if attributes.is_empty() {
                    tracing::warn!(
                        "attribute binding without a `set` option; timer will not write anything"
                    );
                }
                Callback::Bind {
                    targets,
                    attributes,
                }
            }
            other => other,
        }
    }

    fn invoke(&self, payload: &TimerPayload) {
        match self {
            Callback::None => {}
            Callback::Function(f) => f(payload),
            Callback::Bind {
                targets,
                attributes,
            } => {
                let Some(value) = &payload.value else {
                    tracing::trace!(timer = payload.timer.id(), "no value to bind");
                    return;
                };
                for target in targets {
                    match value {
                        TimerValue::Scalar(v) => {
                            for attribute in attributes {
                                target.set_attribute(attribute, *v);
                            }
                        }
                        TimerValue::List(values) => {
                            for (attribute, v) in attributes.iter().zip(values) {
                                target.set_attribute(attribute, *v);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Options every unit starts from
pub fn default_options() -> OptionBag {
    OptionBag::new().with(keys::USE_AUTO_START, true)
}

/// State shared by every scheduling unit
pub struct AnimationBase {
    id: u64,
    me: Weak<dyn Animation>,
    lifecycle: RefCell<LifecycleMachine>,
    duration: Cell<u32>,
    callback: RefCell<Callback>,
    options: RefCell<OptionBag>,
    options_initialized: Cell<bool>,
    events: EventEmitter,
    timer_list: RefCell<Option<Weak<TimerList>>>,
}

impl AnimationBase {
    /// Build the base of a unit.
    ///
    /// `defaults` become the option bag, `options` are merged over them,
    /// `on*` handlers are attached and the callback kind is settled.
    pub fn new(
        me: Weak<dyn Animation>,
        duration: u32,
        callback: Callback,
        defaults: OptionBag,
        options: OptionBag,
    ) -> Self {
        let base = Self {
            id: NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed),
            me,
            lifecycle: RefCell::new(LifecycleMachine::new()),
            duration: Cell::new(duration),
            callback: RefCell::new(Callback::None),
            options: RefCell::new(OptionBag::new()),
            options_initialized: Cell::new(false),
            events: EventEmitter::new(),
            timer_list: RefCell::new(None),
        };

        base.set_options(defaults);
        base.set_option_event(&options);
        base.set_options(options);

        let callback = callback.resolve(&base.options.borrow());
        *base.callback.borrow_mut() = callback;
        base
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Upgrade the self-reference to a shared handle
    pub fn handle(&self) -> Option<AnimationRef> {
        self.me.upgrade()
    }

    pub fn state(&self) -> AnimationState {
        self.lifecycle.borrow().current_state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == AnimationState::Playing
    }

    pub fn duration(&self) -> u32 {
        self.duration.get()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Replace the bag on first use, merge per key afterwards
    pub fn set_options(&self, bag: OptionBag) {
        if self.options_initialized.replace(true) {
            self.options.borrow_mut().merge(bag);
        } else {
            *self.options.borrow_mut() = bag;
        }
    }

    pub fn option(&self, name: &str) -> Option<OptionValue> {
        self.options.borrow().get(name).cloned()
    }

    pub fn set_option(&self, name: &str, value: OptionValue) {
        self.options.borrow_mut().set(name, value);
    }

    pub fn bool_option(&self, name: &str, default: bool) -> bool {
        self.options.borrow().bool_or(name, default)
    }

    pub fn count_option(&self, name: &str, default: u32) -> u32 {
        self.options.borrow().count_or(name, default)
    }

    /// Attach every `on*` handler in `bag` to the matching event
    pub fn set_option_event(&self, bag: &OptionBag) {
        for (kind, handler) in bag.handlers() {
            tracing::trace!(timer = self.id, event = %kind, "attaching option handler");
            self.events.attach(kind, handler);
        }
    }

    /// Fire an event of `kind` at this unit's handlers
    pub fn fire(&self, kind: EventKind) -> bool {
        self.fire_event(AnimationEvent::new(kind, self.id))
    }

    pub fn fire_event(&self, mut event: AnimationEvent) -> bool {
        self.events.dispatch(&mut event)
    }

    /// Start a payload for a fire of this unit
    pub fn payload(&self, frame: u64, running_time: u64) -> Option<TimerPayload> {
        Some(TimerPayload {
            timer: self.handle()?,
            frame,
            duration: self.duration(),
            running_time,
            count: 0,
            skipped_count: 0,
            progress: 0.0,
            value: None,
        })
    }

    pub fn trigger_callback(&self, payload: &TimerPayload) {
        // Clone out so the callback may replace itself or drop the unit's borrow
        let callback = self.callback.borrow().clone();
        callback.invoke(payload);
    }

    pub fn timer_list(&self) -> Option<Rc<TimerList>> {
        self.timer_list.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn send(&self, event: LifecycleEvent) -> bool {
        self.lifecycle.borrow_mut().send(event).is_some()
    }

    fn can_send(&self, event: LifecycleEvent) -> bool {
        self.lifecycle.borrow().can_send(event)
    }

    /// Drop back to idle without events, as a registry hard reset does
    pub(crate) fn force_idle(&self) {
        self.lifecycle.borrow_mut().force_idle();
    }

    /// Leave the current registry, if any, without changing state
    pub(crate) fn leave_timer_list(&self) {
        let previous = self.timer_list.borrow_mut().take();
        if let Some(list) = previous.and_then(|weak| weak.upgrade()) {
            list.remove(self.id);
        }
    }

    fn enter_timer_list(&self, list: &Rc<TimerList>) {
        *self.timer_list.borrow_mut() = Some(Rc::downgrade(list));
    }
}

/// Take a playing unit out of its registry via `event`
fn halt<A: Animation + ?Sized>(unit: &A, event: LifecycleEvent) -> bool {
    let base = unit.base();
    if !base.send(event) {
        return false;
    }
    if let Some(list) = base.timer_list() {
        list.remove(base.id());
    }
    true
}

/// A scheduling unit driven by the registry once per tick
pub trait Animation {
    fn base(&self) -> &AnimationBase;

    /// Advance by one tick
    fn run(&self, frame: u64, frame_duration: u64);

    /// Clear transient run-state
    fn reset(&self);

    /// Hook invoked by `complete` before the unit stops
    fn on_complete(&self) {}

    /// Adjust a requested duration before it is stored
    fn clamp_duration(&self, ms: u32) -> u32 {
        ms
    }

    fn id(&self) -> u64 {
        self.base().id()
    }

    fn state(&self) -> AnimationState {
        self.base().state()
    }

    fn is_playing(&self) -> bool {
        self.base().is_playing()
    }

    fn duration(&self) -> u32 {
        self.base().duration()
    }

    /// Set the duration in milliseconds; fractions are truncated
    fn set_duration(&self, ms: f64) -> Result<()> {
        let ms = self.clamp_duration(coerce_duration(ms)?);
        self.base().duration.set(ms);
        Ok(())
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        self.base().option(name)
    }

    fn set_option(&self, name: &str, value: OptionValue) {
        self.base().set_option(name, value);
    }

    fn set_options(&self, bag: OptionBag) {
        self.base().set_options(bag);
    }

    fn attach(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        self.base().events().attach(kind, handler)
    }

    fn detach(&self, kind: &EventKind, id: Option<HandlerId>) -> usize {
        self.base().events().detach(kind, id)
    }

    fn trigger_callback(&self, payload: &TimerPayload) {
        self.base().trigger_callback(payload);
    }

    /// Register with `list`, starting right away if `useAutoStart` is set
    fn set_timer_list(&self, list: &Rc<TimerList>) {
        let base = self.base();
        let was_playing = base.is_playing();
        base.leave_timer_list();
        base.enter_timer_list(list);

        if was_playing {
            if let Some(me) = base.handle() {
                list.add(me);
            }
        } else if base.bool_option(keys::USE_AUTO_START, true) {
            self.start();
        }
    }

    /// Begin or resume playing
    fn start(&self) {
        let base = self.base();
        if !base.send(LifecycleEvent::Start) {
            return;
        }
        let list = base.timer_list();
        if let (Some(list), Some(me)) = (list, base.handle()) {
            list.add(me);
        }
        tracing::trace!(timer = base.id(), "timer started");
        base.fire(EventKind::Start);
    }

    /// Stop and clear run-state, firing `stop`
    fn stop(&self) {
        self.stop_with(false);
    }

    /// Stop and clear run-state; `skip_event` suppresses the `stop` event
    fn stop_with(&self, skip_event: bool) {
        if !halt(self, LifecycleEvent::Stop) {
            return;
        }
        self.reset();
        tracing::trace!(timer = self.id(), "timer stopped");
        if !skip_event {
            self.base().fire(EventKind::Stop);
        }
    }

    /// Stop without clearing run-state so `start` resumes
    fn pause(&self) {
        if !halt(self, LifecycleEvent::Pause) {
            return;
        }
        tracing::trace!(timer = self.id(), "timer paused");
        self.base().fire(EventKind::Pause);
    }

    /// Finish normally: fires `complete` but not `stop`
    fn complete(&self) {
        if !self.base().can_send(LifecycleEvent::Complete) {
            return;
        }
        self.on_complete();
        if !halt(self, LifecycleEvent::Complete) {
            // The hook already stopped the unit
            return;
        }
        self.reset();
        tracing::trace!(timer = self.id(), "timer completed");
        self.base().fire(EventKind::Complete);
    }
}
