//! Event handling.

use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    ///
    /// The handler runs to completion before the next event is taken from the queue.
    /// It may emit new events, which must not be scheduled before the current simulation time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use cloudsim_core::{cast, Event, EventHandler, Simulation, SimulationContext};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct Submit {
    ///     length: u64,
    /// }
    ///
    /// pub struct Counter {
    ///     total_length: u64,
    ///     ctx: SimulationContext,
    /// }
    ///
    /// impl EventHandler for Counter {
    ///     fn on(&mut self, event: Event) {
    ///         cast!(match event.data {
    ///             Submit { length } => {
    ///                 self.total_length += length;
    ///             }
    ///         })
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut client_ctx = sim.create_context("client");
    /// let counter_ctx = sim.create_context("counter");
    /// let counter = Rc::new(RefCell::new(Counter { total_length: 0, ctx: counter_ctx }));
    /// let counter_id = sim.add_handler("counter", counter.clone());
    /// client_ctx.emit(Submit { length: 1000 }, counter_id, 1.2);
    /// assert_eq!(counter.borrow().total_length, 0);
    /// sim.step();
    /// assert_eq!(counter.borrow().total_length, 1000);
    /// ```
    fn on(&mut self, event: Event);
}

/// Enables the use of pattern matching syntax for processing different types of events
/// by downcasting the event payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Match arms need not be exhaustive. If the payload does not match any of the arms,
/// the event is logged as unhandled under `ERROR` level.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use cloudsim_core::{cast, Event, EventHandler};
///
/// #[derive(Clone, Serialize)]
/// pub struct VmCreate {
///     vm_id: u32,
/// }
///
/// #[derive(Clone, Serialize)]
/// pub struct ScalingCheck {
///     vm_id: u32,
/// }
///
/// pub struct Datacenter {
///     created: Vec<u32>,
///     checked: Vec<u32>,
/// }
///
/// impl EventHandler for Datacenter {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             VmCreate { vm_id } => {
///                 self.created.push(vm_id);
///             }
///             ScalingCheck { vm_id } => {
///                 self.checked.push(vm_id);
///             }
///         })
///     }
/// }
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
