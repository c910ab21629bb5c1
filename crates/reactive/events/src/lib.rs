//! Synchronous publish/subscribe core.
//!
//! This crate provides the notification substrate the rest of the framework
//! builds on:
//! - [`Emitter`]: listener registration (`on`/`once`/`off`), cross-object
//!   registration (`listen_to`/`stop_listening`), synchronous dispatch
//!   (`fire`) and event forwarding (`delegate`);
//! - [`EventRecord`]: the per-dispatch value object carrying source, name,
//!   causal path, control flags and an overridable return value;
//! - [`Priority`]: five named dispatch priorities plus arbitrary numeric ones;
//! - [`Emits`]: composition trait — a type embeds an [`Emitter`] and gains
//!   the whole surface as provided methods.
//!
//! Everything is single-threaded in spirit: dispatch is synchronous and
//! re-entrant, with no queuing and no suspension points. Internal locks are
//! never held while user callbacks run.

mod delegate;
mod emitter;
mod node;
mod priority;
mod record;

pub use delegate::DelegateChain;
pub use emitter::{Emitter, ListenerFn, ListenerId};
pub use priority::Priority;
pub use record::EventRecord;
pub use serde_json::Value;

/// Capability trait for types that embed an [`Emitter`].
///
/// Implementors provide [`emitter`](Self::emitter); every operation is a
/// provided method forwarding to it, so concrete types compose the emitter
/// by delegation instead of inheritance.
pub trait Emits {
	/// The embedded emitter handle.
	fn emitter(&self) -> &Emitter;

	fn on(
		&self,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter().on(event, callback)
	}

	fn on_prio(
		&self,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter().on_prio(event, priority, callback)
	}

	fn once(
		&self,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter().once(event, callback)
	}

	fn once_prio(
		&self,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter().once_prio(event, priority, callback)
	}

	fn off(&self, id: ListenerId) {
		self.emitter().off(id);
	}

	fn listen_to(
		&self,
		other: &impl Emits,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter().listen_to(other.emitter(), event, callback)
	}

	fn listen_to_prio(
		&self,
		other: &impl Emits,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.emitter()
			.listen_to_prio(other.emitter(), event, priority, callback)
	}

	fn stop_listening(&self, other: &impl Emits) {
		self.emitter().stop_listening(other.emitter());
	}

	fn stop_listening_event(&self, other: &impl Emits, event: &str) {
		self.emitter().stop_listening_event(other.emitter(), event);
	}

	fn stop_listening_all(&self) {
		self.emitter().stop_listening_all();
	}

	fn fire(&self, event: &str, args: &[Value]) -> Option<Value> {
		self.emitter().fire(event, args)
	}

	#[must_use = "delegation is installed by the chain's `to*` methods"]
	fn delegate(&self, events: &[&str]) -> DelegateChain<'_> {
		self.emitter().delegate(events)
	}

	fn stop_delegating(&self) {
		self.emitter().stop_delegating();
	}

	fn stop_delegating_event(&self, event: &str) {
		self.emitter().stop_delegating_event(event);
	}

	fn stop_delegating_to(&self, event: &str, dest: &impl Emits) {
		self.emitter().stop_delegating_to(event, dest.emitter());
	}
}

impl Emits for Emitter {
	fn emitter(&self) -> &Emitter {
		self
	}
}

#[cfg(test)]
mod tests;
