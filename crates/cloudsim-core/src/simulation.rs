//! Simulation configuration and execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::Level::Trace;
use log::{debug, log_enabled, trace};
use rand::distributions::uniform::{SampleRange, SampleUniform};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::event::Event;
use crate::handler::EventHandler;
use crate::log::log_undelivered_event;
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The simulation owns the global event queue. It is strictly single-threaded: events are dispatched one by one
/// in the order of their time and, for equal times, in the order of their creation.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: HashMap<String, Id>,
    names: Rc<RefCell<Vec<String>>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            name_to_id: HashMap::new(),
            names: Rc::new(RefCell::new(Vec::new())),
            handlers: Vec::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.name_to_id.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.borrow_mut().push(name.to_owned());
        self.handlers.push(None);
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// Panics if component with such name does not exist.
    pub fn lookup_id(&self, name: &str) -> Id {
        *self
            .name_to_id
            .get(name)
            .unwrap_or_else(|| panic!("Component {} does not exist", name))
    }

    /// Returns the name of component by its identifier.
    ///
    /// Panics if component with such Id does not exist.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    /// Creates a new simulation context with specified name.
    ///
    /// Component ids are assigned sequentially starting from 0.
    /// Creating a context with the name of existing component returns a context bound to the same id.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let ctx = SimulationContext::new(
            self.register(name.as_ref()),
            name.as_ref(),
            self.sim_state.clone(),
            self.names.clone(),
        );
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            crate::log::get_colored("DEBUG", colored::Color::Blue),
            json!({"name": ctx.name(), "id": ctx.id()})
        );
        ctx
    }

    /// Registers the event handler implementation for component with specified name, returns the component Id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Added handler: {}",
            self.time(),
            crate::log::get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        id
    }

    /// Removes the event handler for component with specified name.
    ///
    /// All subsequent events destined for this component will not be delivered until the handler is added again.
    pub fn remove_handler<S>(&mut self, name: S)
    where
        S: AsRef<str>,
    {
        let id = self.lookup_id(name.as_ref());
        self.handlers[id as usize] = None;
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Removed handler: {}",
            self.time(),
            crate::log::get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Performs a single step through the simulation.
    ///
    /// Takes the next event from the queue, advances the simulation time to event time and tries to process it
    /// by invoking the [`EventHandler::on()`](crate::EventHandler::on()) method of the corresponding event handler.
    /// If there is no handler registered for component with Id `event.dst`, logs the undelivered event and discards it.
    ///
    /// Returns `true` if some pending event was found (no matter was it properly processed or not) and `false`
    /// otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use cloudsim_core::Simulation;
    ///
    /// #[derive(Serialize)]
    /// pub struct CloudletSubmit {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut ctx = sim.create_context("broker");
    /// ctx.emit_self(CloudletSubmit {}, 1.2);
    /// assert!(sim.step());
    /// assert_eq!(sim.time(), 1.2);
    /// assert!(!sim.step());
    /// ```
    pub fn step(&mut self) -> bool {
        let next = self.sim_state.borrow_mut().next_event();
        let Some(event) = next else {
            return false;
        };
        if log_enabled!(Trace) {
            let src_name = self.lookup_name(event.src);
            let dst_name = self.lookup_name(event.dst);
            trace!(
                target: &dst_name,
                "[{:.3} {} {}] {}",
                event.time,
                crate::log::get_colored("EVENT", colored::Color::BrightBlack),
                dst_name,
                json!({"type": type_name(&event.data).unwrap_or("unknown"), "data": event.data, "src": src_name})
            );
        }
        match self.handlers.get(event.dst as usize) {
            Some(Some(handler)) => handler.borrow_mut().on(event),
            _ => log_undelivered_event(event),
        }
        true
    }

    /// Dispatches the next event and reports whether the event queue is now empty.
    ///
    /// Returns `true` also when there was no event to dispatch.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use cloudsim_core::Simulation;
    ///
    /// #[derive(Serialize)]
    /// pub struct CloudletFinish {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut ctx = sim.create_context("datacenter");
    /// ctx.emit_self(CloudletFinish {}, 1.0);
    /// ctx.emit_self(CloudletFinish {}, 2.0);
    /// assert!(!sim.advance());
    /// assert!(sim.advance());
    /// assert_eq!(sim.time(), 2.0);
    /// ```
    pub fn advance(&mut self) -> bool {
        self.step();
        !self.has_pending_events()
    }

    /// Returns `true` if there are events waiting in the queue (cancelled events are not counted).
    pub fn has_pending_events(&self) -> bool {
        self.sim_state.borrow_mut().has_pending_events()
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `true` if there could be more pending events and `false` otherwise.
    pub fn steps(&mut self, step_count: u64) -> bool {
        for _ in 0..step_count {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Runs the simulation until there are no pending events left or some component requested a stop
    /// via [`SimulationContext::stop_simulation()`](crate::SimulationContext::stop_simulation()).
    pub fn run(&mut self) {
        while self.step() {
            if self.sim_state.borrow_mut().take_stop_request() {
                debug!(
                    target: "simulation",
                    "[{:.3} {} simulation] Stopped by request",
                    self.time(),
                    crate::log::get_colored("DEBUG", colored::Color::Blue),
                );
                break;
            }
        }
    }

    /// Runs the simulation like [`run()`](Self::run()), but does not process events with time above `max_time`.
    ///
    /// Returns `true` if there are pending events left.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use cloudsim_core::Simulation;
    ///
    /// #[derive(Serialize)]
    /// pub struct ScalingCheck {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut ctx = sim.create_context("datacenter");
    /// ctx.emit_self(ScalingCheck {}, 1.0);
    /// ctx.emit_self(ScalingCheck {}, 2.0);
    /// ctx.emit_self(ScalingCheck {}, 3.5);
    /// assert!(sim.run_until(2.0));
    /// assert_eq!(sim.time(), 2.0);
    /// assert!(!sim.run_until(10.0));
    /// assert_eq!(sim.time(), 3.5);
    /// ```
    pub fn run_until(&mut self, max_time: f64) -> bool {
        loop {
            match self.next_event_time() {
                Some(time) if time <= max_time => {}
                Some(_) => return true,
                None => return false,
            }
            self.step();
            if self.sim_state.borrow_mut().take_stop_request() {
                return self.has_pending_events();
            }
        }
    }

    /// Steps through the simulation with duration limit.
    ///
    /// Invokes [`step()`](Self::step()) until the next event time is above `current_time + duration`
    /// or there are no pending events left.
    ///
    /// Returns `true` if there could be more pending events and `false` otherwise.
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end_time = self.time() + duration;
        loop {
            match self.next_event_time() {
                Some(time) if time <= end_time => {
                    self.step();
                }
                Some(_) => return true,
                None => return false,
            }
        }
    }

    fn next_event_time(&self) -> Option<f64> {
        self.sim_state.borrow_mut().peek_event().map(|e| e.time)
    }

    /// Returns a random float in the range _[0, 1)_
    /// using the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range
    /// using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Returns the total number of created events.
    ///
    /// Note that cancelled events are also counted here.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Cancels events that satisfy the given predicate function.
    ///
    /// Note that already processed events cannot be cancelled.
    pub fn cancel_events<F>(&mut self, pred: F)
    where
        F: Fn(&Event) -> bool,
    {
        self.sim_state.borrow_mut().cancel_events(pred);
    }
}
