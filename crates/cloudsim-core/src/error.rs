//! Errors reported by the simulation core.

use thiserror::Error;

use crate::event::EventId;

/// An attempt to schedule an event before the current simulation time.
///
/// Such an event would break the monotonicity of the simulation clock, so it always indicates a bug
/// in the component which emitted it.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("event {event_id} is scheduled at {time} which is before the current time {current_time}")]
pub struct InvalidTimeError {
    /// Id reserved for the rejected event.
    pub event_id: EventId,
    /// Requested event time.
    pub time: f64,
    /// Simulation time at the moment of the request.
    pub current_time: f64,
}
