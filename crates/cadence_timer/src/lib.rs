//! Cadence Timer System
//!
//! Frame-synchronized delays, repeats, queues and transitions driven by an
//! external render loop.
//!
//! # Features
//!
//! - **Delays**: fire once after a duration, then complete
//! - **Repeats**: fixed intervals with drift compensation for stalled frames
//! - **Queues**: play units in sequence, looping and nesting
//! - **Transitions**: eased interpolation, optionally bound to attributes
//! - **Cycles**: step through a list of values at a fixed rate
//! - **Registry**: a mutation-tolerant active list dispatched once per tick

pub mod animation;
pub mod config;
pub mod cycle;
pub mod delay;
pub mod easing;
pub mod queue;
pub mod repeat;
pub mod service;
pub mod timer_list;
pub mod transition;

pub use animation::{
    default_options, Animation, AnimationBase, AnimationRef, Callback, TimerCallback,
    TimerPayload, TimerValue,
};
pub use config::TimerConfig;
pub use cycle::Cycle;
pub use delay::Delay;
pub use easing::Easing;
pub use queue::Queue;
pub use repeat::Repeat;
pub use service::TimerService;
pub use timer_list::TimerList;
pub use transition::Transition;
