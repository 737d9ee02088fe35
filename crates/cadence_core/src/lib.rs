//! Cadence Core Runtime
//!
//! This crate provides the foundational primitives shared by every Cadence
//! scheduling unit:
//!
//! - **Lifecycle**: the idle/playing/paused state machine every unit follows
//! - **Event Dispatch**: cancellable `start`/`stop`/`pause`/`complete` events
//! - **Option Bags**: construction-time configuration with `on*` handler wiring
//! - **Attribute Targets**: external state a timer can drive without a callback
//!
//! # Example
//!
//! ```rust
//! use cadence_core::events::{handler, AnimationEvent, EventEmitter, EventKind};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let emitter = EventEmitter::new();
//! let fired = Rc::new(Cell::new(0));
//! let fired_clone = fired.clone();
//!
//! emitter.attach(EventKind::Complete, handler(move |_| fired_clone.set(fired_clone.get() + 1)));
//!
//! let mut event = AnimationEvent::new(EventKind::Complete, 1);
//! emitter.dispatch(&mut event);
//! assert_eq!(fired.get(), 1);
//! ```

pub mod attributes;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod options;

pub use attributes::{AttributeBag, AttributeTarget};
pub use error::{Result, TimerError};
pub use events::{handler, AnimationEvent, EventEmitter, EventHandler, EventKind, HandlerId};
pub use lifecycle::{AnimationState, LifecycleEvent, LifecycleMachine};
pub use options::{OptionBag, OptionValue};
