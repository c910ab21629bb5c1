//! Ordered, observable, id-indexed collections.
//!
//! A [`Collection`] stores JSON object items in order, indexed by a string
//! id living on the item itself. Mutations fire `add`, `remove` and
//! aggregate `change` events through the embedded emitter, and
//! [`Collection::bind_to`] keeps one collection synchronized from another
//! through a transform that may skip items; skipped source indices are
//! ledgered so later inserts still land where they belong.

mod bind;
mod collection;
mod error;

pub use bind::{CollectionBindChain, TransformFn};
pub use collection::{Collection, ItemKey};
pub use error::CollectionError;
pub use vellum_events::{Emits, EventRecord, Priority, Value};
