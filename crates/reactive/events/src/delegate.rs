//! Event delegation: forwarding events fired on one emitter to another.

use std::sync::Arc;
use std::sync::Weak;

use crate::emitter::{Emitter, EmitterInner};

#[derive(Clone)]
pub(crate) enum Rename {
	Fixed(Box<str>),
	Mapped(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

/// One forwarding destination for one event name.
pub(crate) struct Delegation {
	pub dest: Weak<EmitterInner>,
	pub dest_id: u64,
	rename: Option<Rename>,
}

impl Delegation {
	/// Event name to fire on the destination for an original `name`.
	pub fn rename(&self, name: &str) -> String {
		match &self.rename {
			None => name.to_string(),
			Some(Rename::Fixed(fixed)) => fixed.to_string(),
			Some(Rename::Mapped(map)) => map(name),
		}
	}
}

/// Chainable half of `delegate(...)`; each `to*` call installs the declared
/// events for one destination and returns the chain for further destinations.
pub struct DelegateChain<'a> {
	emitter: &'a Emitter,
	events: Vec<Box<str>>,
}

impl<'a> DelegateChain<'a> {
	pub(crate) fn new(emitter: &'a Emitter, events: &[&str]) -> Self {
		Self {
			emitter,
			events: events.iter().map(|&e| e.into()).collect(),
		}
	}

	/// Forwards the events to `dest` under their original names.
	pub fn to(self, dest: &Emitter) -> Self {
		self.install(dest, None)
	}

	/// Forwards the events to `dest` under a fixed replacement name.
	pub fn to_named(self, dest: &Emitter, name: &str) -> Self {
		self.install(dest, Some(Rename::Fixed(name.into())))
	}

	/// Forwards the events to `dest`, renaming each via `map` (which receives
	/// the original event name).
	pub fn to_mapped(
		self,
		dest: &Emitter,
		map: impl Fn(&str) -> String + Send + Sync + 'static,
	) -> Self {
		self.install(dest, Some(Rename::Mapped(Arc::new(map))))
	}

	fn install(self, dest: &Emitter, rename: Option<Rename>) -> Self {
		for event in &self.events {
			self.emitter.install_delegation(
				event,
				Delegation {
					dest: dest.downgrade(),
					dest_id: dest.id(),
					rename: rename.clone(),
				},
			);
		}
		self
	}
}
