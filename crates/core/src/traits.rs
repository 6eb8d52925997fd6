//! State machine traits.

use crate::{Action, Event};
use std::time::Duration;

/// A deterministic, synchronous state machine.
///
/// Implementations must not perform I/O or read wall-clock time; the runner
/// provides the current time through [`StateMachine::set_time`].
pub trait StateMachine {
    /// Process an event, returning the actions to perform.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time (simulated or wall-clock since start).
    fn set_time(&mut self, now: Duration);

    /// Get the current time.
    fn now(&self) -> Duration;
}
