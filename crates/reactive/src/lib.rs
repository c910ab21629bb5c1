//! Reactive core.
//!
//! This crate aggregates the reactive sub-crates. Depend on this crate to
//! get the whole surface, rather than depending on individual sub-crates.
//!
//! # Sub-crates
//!
//! - [`vellum_events`] - Synchronous pub/sub: emitters, namespaced events,
//!   priorities, delegation
//! - [`vellum_observable`] - Reactive properties with interceptable writes
//!   and one- or two-way bindings
//! - [`vellum_collection`] - Ordered id-indexed collections with skip-aware
//!   synchronization

pub use vellum_collection::{Collection, CollectionBindChain, CollectionError, ItemKey};
pub use vellum_events::{
	DelegateChain, Emits, Emitter, EventRecord, ListenerFn, ListenerId, Priority, Value,
};
pub use vellum_observable::{BindChain, ComputeFn, MethodFn, Observable, ObservableError};
