//! Animation lifecycle state machine
//!
//! Every scheduling unit moves through the same flat statechart:
//!
//! ```text
//! Idle    --Start-->    Playing
//! Playing --Stop-->     Idle
//! Playing --Complete--> Idle
//! Playing --Pause-->    Paused
//! Paused  --Start-->    Playing
//! ```
//!
//! Any other (state, event) pair is not a transition, and the unit treats the
//! corresponding operation as a no-op.

use smallvec::SmallVec;

/// Lifecycle state of a scheduling unit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnimationState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Events that drive the lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Start,
    Stop,
    Pause,
    Complete,
}

/// A transition in the lifecycle table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from_state: AnimationState,
    pub event: LifecycleEvent,
    pub to_state: AnimationState,
}

impl Transition {
    const fn new(from: AnimationState, event: LifecycleEvent, to: AnimationState) -> Self {
        Self {
            from_state: from,
            event,
            to_state: to,
        }
    }
}

const TRANSITIONS: [Transition; 5] = [
    Transition::new(
        AnimationState::Idle,
        LifecycleEvent::Start,
        AnimationState::Playing,
    ),
    Transition::new(
        AnimationState::Paused,
        LifecycleEvent::Start,
        AnimationState::Playing,
    ),
    Transition::new(
        AnimationState::Playing,
        LifecycleEvent::Stop,
        AnimationState::Idle,
    ),
    Transition::new(
        AnimationState::Playing,
        LifecycleEvent::Complete,
        AnimationState::Idle,
    ),
    Transition::new(
        AnimationState::Playing,
        LifecycleEvent::Pause,
        AnimationState::Paused,
    ),
];

/// Maximum number of transitions kept for debugging
const HISTORY_LIMIT: usize = 8;

/// The lifecycle machine of one unit
#[derive(Clone, Debug, Default)]
pub struct LifecycleMachine {
    current_state: AnimationState,
    /// Most recent transitions, oldest first
    history: SmallVec<[(AnimationState, LifecycleEvent, AnimationState); HISTORY_LIMIT]>,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn current_state(&self) -> AnimationState {
        self.current_state
    }

    /// Check if we're in a specific state
    pub fn is_in(&self, state: AnimationState) -> bool {
        self.current_state == state
    }

    /// Check if an event triggers a transition from the current state
    pub fn can_send(&self, event: LifecycleEvent) -> bool {
        self.lookup(event).is_some()
    }

    /// Send an event, returning the new state if a transition happened
    pub fn send(&mut self, event: LifecycleEvent) -> Option<AnimationState> {
        let transition = self.lookup(event)?;
        self.current_state = transition.to_state;

        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history
            .push((transition.from_state, event, transition.to_state));

        Some(transition.to_state)
    }

    /// Force the machine back to idle without recording a transition
    pub fn force_idle(&mut self) {
        self.current_state = AnimationState::Idle;
    }

    /// Get recent transition history
    pub fn history(&self) -> &[(AnimationState, LifecycleEvent, AnimationState)] {
        &self.history
    }

    fn lookup(&self, event: LifecycleEvent) -> Option<Transition> {
        TRANSITIONS
            .iter()
            .find(|t| t.from_state == self.current_state && t.event == event)
            .copied()
    }
}
