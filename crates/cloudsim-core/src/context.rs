//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::error::InvalidTimeError;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// A facade for accessing the simulation state and producing events from simulation components.
///
/// Each component owns its context, which is bound to the component id. All events emitted via the context
/// have this id as their source.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        sim_state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
            names,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Schedules an event for component `dst` at the absolute simulation time `time`.
    ///
    /// Fails with [`InvalidTimeError`] if `time` is before the current simulation time.
    /// Events emitted from inside a handler are allowed as long as they are not in the past,
    /// including events at exactly the current time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use cloudsim_core::Simulation;
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct ScalingCheck {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut ctx = sim.create_context("datacenter");
    /// ctx.emit_self(ScalingCheck {}, 5.0);
    /// sim.step();
    /// assert!(ctx.emit_at(ScalingCheck {}, ctx.id(), 7.5).is_ok());
    /// assert!(ctx.emit_at(ScalingCheck {}, ctx.id(), 2.0).is_err());
    /// ```
    pub fn emit_at<T>(&mut self, data: T, dst: Id, time: f64) -> Result<EventId, InvalidTimeError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event_at(data, self.id, dst, time)
    }

    /// Emits an event for component `dst` which will be delivered after the specified delay.
    ///
    /// Panics if the delay is negative, since it is not allowed to add events from the past.
    pub fn emit<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        let result = self.sim_state.borrow_mut().add_event(data, self.id, dst, delay);
        Self::expect_valid_time(result)
    }

    /// Emits an event for component `dst` which will be delivered at the current time.
    pub fn emit_now<T>(&mut self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.emit(data, dst, 0.)
    }

    /// Emits an event for the component itself which will be delivered after the specified delay.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, delay)
    }

    /// Emits an event for the component itself which will be delivered at the current time.
    pub fn emit_self_now<T>(&mut self, data: T) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, 0.)
    }

    /// Cancels the specified event.
    ///
    /// Cancelling an already processed event has no effect.
    pub fn cancel_event(&mut self, id: EventId) {
        self.sim_state.borrow_mut().cancel_event(id);
    }

    /// Asks the simulation to stop after the currently processed event.
    ///
    /// This is the way to express a timeout: schedule a terminal event and request the stop when handling it.
    pub fn stop_simulation(&mut self) {
        self.sim_state.borrow_mut().request_stop();
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    fn expect_valid_time(result: Result<EventId, InvalidTimeError>) -> EventId {
        match result {
            Ok(event_id) => event_id,
            Err(e) => panic!("Event delay is negative! It is not allowed to add events from the past: {}", e),
        }
    }
}
