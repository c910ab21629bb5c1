//! Reactive properties over the event core.
//!
//! An [`Observable`] is an emitter with a property store attached. Writes go
//! through [`Observable::set`], which fires `set:<name>` (interceptable) and
//! `change:<name>` (equality gated), and properties can be kept in sync
//! across objects with [`Observable::bind`]. Methods registered with
//! [`Observable::define_method`] can be re-routed through an event via
//! [`Observable::decorate`] so other objects may intercept calls.
//!
//! Two-way synchronization is two opposing one-way bindings; the equality
//! gate in `set` is what stops the resulting cascade.

mod bind;
mod error;
mod observable;

pub use bind::{BindChain, ComputeFn};
pub use error::ObservableError;
pub use observable::{MethodFn, Observable};
pub use vellum_events::{Emits, EventRecord, Priority, Value};
