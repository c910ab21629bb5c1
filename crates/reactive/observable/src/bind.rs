//! Property binding between observables.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;
use vellum_events::{Emits, ListenerId};

use crate::error::ObservableError;
use crate::observable::{Observable, ObservableInner};

/// Closure combining several source values into one bound value.
pub type ComputeFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// One source property feeding a binding.
pub(crate) struct SourcePair {
	pub source: Weak<ObservableInner>,
	pub emitter_id: u64,
	pub property: Box<str>,
}

/// A live binding created by [`Observable::bind`].
///
/// Direct bindings pair each target property with one source pair; computed
/// bindings feed every pair through `callback` into a single target property.
pub(crate) struct Binding {
	pub properties: Vec<Box<str>>,
	pub pairs: Vec<SourcePair>,
	pub callback: Option<Arc<ComputeFn>>,
}

pub(crate) struct SourceProp {
	pub listener: ListenerId,
	pub bindings: Vec<Arc<Binding>>,
}

#[derive(Default)]
pub(crate) struct BindingTable {
	/// Bound target property -> its binding. One binding per property.
	pub own: FxHashMap<Box<str>, Arc<Binding>>,
	/// Source emitter id -> per-property listener bookkeeping.
	pub sources: FxHashMap<u64, FxHashMap<Box<str>, SourceProp>>,
}

/// Second half of the `bind(..).to(..)` call chain.
#[must_use = "a bind chain does nothing until one of its `to` methods runs"]
pub struct BindChain {
	target: Observable,
	properties: Vec<Box<str>>,
}

impl Observable {
	/// Starts binding the named properties of this observable to another.
	///
	/// Finish the chain with [`BindChain::to`] (same-named source
	/// properties), [`BindChain::to_props`] (renamed), [`BindChain::to_many`]
	/// (per-property sources) or [`BindChain::to_computed`] (many sources
	/// folded into one value). Until then nothing is bound.
	pub fn bind(&self, properties: &[&str]) -> Result<BindChain, ObservableError> {
		if properties.is_empty() {
			return Err(ObservableError::BindWithoutProperties);
		}
		let table = self.inner.bindings.lock();
		let mut seen: Vec<&str> = Vec::with_capacity(properties.len());
		for name in properties {
			if seen.contains(name) {
				return Err(ObservableError::DuplicateBindProperty((*name).into()));
			}
			seen.push(name);
			if table.own.contains_key(*name) {
				return Err(ObservableError::PropertyAlreadyBound((*name).into()));
			}
		}
		drop(table);
		Ok(BindChain {
			target: self.clone(),
			properties: properties.iter().map(|p| (*p).into()).collect(),
		})
	}

	/// Removes the binding on one property. Unknown or unbound names are a
	/// no-op.
	pub fn unbind(&self, property: &str) {
		let binding = self.inner.bindings.lock().own.remove(property);
		if let Some(binding) = binding {
			self.release_binding(&binding);
		}
	}

	/// Removes every binding on this observable.
	pub fn unbind_all(&self) {
		let bindings: Vec<Arc<Binding>> = {
			let mut table = self.inner.bindings.lock();
			let mut taken: Vec<Arc<Binding>> = Vec::new();
			for (_, binding) in table.own.drain() {
				if !taken.iter().any(|b| Arc::ptr_eq(b, &binding)) {
					taken.push(binding);
				}
			}
			taken
		};
		for binding in bindings {
			self.release_binding(&binding);
		}
	}

	/// Drops one binding's listener bookkeeping. The binding must already be
	/// out of `own` (a multi-property binding dies as a whole).
	fn release_binding(&self, binding: &Arc<Binding>) {
		let mut dead_listeners: Vec<ListenerId> = Vec::new();
		{
			let mut table = self.inner.bindings.lock();
			table
				.own
				.retain(|_, other| !Arc::ptr_eq(other, binding));
			for pair in &binding.pairs {
				let Some(props) = table.sources.get_mut(&pair.emitter_id) else {
					continue;
				};
				if let Some(slot) = props.get_mut(&pair.property) {
					slot.bindings.retain(|b| !Arc::ptr_eq(b, binding));
					if slot.bindings.is_empty() {
						dead_listeners.push(slot.listener);
						props.remove(&pair.property);
					}
				}
				if props.is_empty() {
					table.sources.remove(&pair.emitter_id);
				}
			}
		}
		for id in dead_listeners {
			self.off(id);
		}
	}

	/// Registers (or reuses) the `change:<prop>` listener for one source
	/// property and attaches the binding to it.
	fn attach_pair(&self, source: &Observable, property: &str, binding: &Arc<Binding>) {
		let emitter_id = source.emitter().id();
		{
			let mut table = self.inner.bindings.lock();
			if let Some(slot) = table
				.sources
				.get_mut(&emitter_id)
				.and_then(|props| props.get_mut(property))
			{
				slot.bindings.push(binding.clone());
				return;
			}
		}

		let target = self.downgrade();
		let prop_key: Box<str> = property.into();
		let listener = self.listen_to(
			source,
			&format!("change:{property}"),
			move |record, _args| {
				let Some(target) = target.upgrade() else {
					return;
				};
				let target = Observable::from_inner(target);
				let source_id = record.source().id();
				let affected: Vec<Arc<Binding>> = {
					let table = target.inner.bindings.lock();
					match table
						.sources
						.get(&source_id)
						.and_then(|props| props.get(&prop_key))
					{
						Some(slot) => slot.bindings.clone(),
						None => return,
					}
				};
				for binding in affected {
					target.update_binding(&binding, Some((source_id, &prop_key)));
				}
			},
		);

		let mut table = self.inner.bindings.lock();
		let props = table.sources.entry(emitter_id).or_default();
		match props.get_mut(property) {
			// Lost the race against a parallel attach; fold into its slot.
			Some(slot) => {
				slot.bindings.push(binding.clone());
				drop(table);
				self.off(listener);
			}
			None => {
				props.insert(
					property.into(),
					SourceProp {
						listener,
						bindings: vec![binding.clone()],
					},
				);
			}
		}
	}

	/// Pushes current source values through one binding.
	///
	/// `changed` narrows a direct binding to the target properties fed by
	/// that source pair; `None` refreshes everything (initial sync).
	pub(crate) fn update_binding(&self, binding: &Binding, changed: Option<(u64, &str)>) {
		if let Some(callback) = &binding.callback {
			let mut values = Vec::with_capacity(binding.pairs.len());
			for pair in &binding.pairs {
				values.push(pair_value(pair));
			}
			let value = callback(&values);
			if let Err(err) = self.set(&binding.properties[0], value) {
				warn!(property = %binding.properties[0], %err, "bound update rejected");
			}
			return;
		}

		for (i, property) in binding.properties.iter().enumerate() {
			let pair = &binding.pairs[i];
			if let Some((source_id, changed_prop)) = changed
				&& (pair.emitter_id != source_id || &*pair.property != changed_prop)
			{
				continue;
			}
			if let Err(err) = self.set(property, pair_value(pair)) {
				warn!(property = %property, %err, "bound update rejected");
			}
		}
	}

	fn apply_binding(
		&self,
		properties: Vec<Box<str>>,
		pairs: Vec<(Observable, Box<str>)>,
		callback: Option<Arc<ComputeFn>>,
	) -> Result<(), ObservableError> {
		// Re-check under the chain holder's control: another bind may have
		// claimed a property since `bind()` ran.
		{
			let table = self.inner.bindings.lock();
			for name in &properties {
				if table.own.contains_key(name) {
					return Err(ObservableError::PropertyAlreadyBound(name.clone()));
				}
			}
		}

		let binding = Arc::new(Binding {
			properties,
			pairs: pairs
				.iter()
				.map(|(source, property)| SourcePair {
					source: source.downgrade(),
					emitter_id: source.emitter().id(),
					property: property.clone(),
				})
				.collect(),
			callback,
		});

		{
			let mut table = self.inner.bindings.lock();
			for name in &binding.properties {
				table.own.insert(name.clone(), binding.clone());
			}
		}
		for (source, property) in &pairs {
			self.attach_pair(source, property, &binding);
		}

		self.update_binding(&binding, None);
		Ok(())
	}
}

fn pair_value(pair: &SourcePair) -> Value {
	pair.source
		.upgrade()
		.and_then(|inner| inner.properties.lock().get(&pair.property).cloned())
		.unwrap_or(Value::Null)
}

impl BindChain {
	/// Binds each chained property to the same-named property of `source`.
	pub fn to(self, source: &Observable) -> Result<(), ObservableError> {
		let pairs = self
			.properties
			.iter()
			.map(|p| (source.clone(), p.clone()))
			.collect();
		self.target.apply_binding(self.properties, pairs, None)
	}

	/// Binds each chained property to the correspondingly named property of
	/// `source`. The counts must match.
	pub fn to_props(self, source: &Observable, properties: &[&str]) -> Result<(), ObservableError> {
		if properties.len() != self.properties.len() {
			return Err(ObservableError::BindingCountMismatch {
				bound: self.properties.len(),
				sources: properties.len(),
			});
		}
		let pairs = properties
			.iter()
			.map(|p| (source.clone(), (*p).into()))
			.collect();
		self.target.apply_binding(self.properties, pairs, None)
	}

	/// Binds each chained property to its own `(source, property)` pair.
	pub fn to_many(self, sources: &[(&Observable, &str)]) -> Result<(), ObservableError> {
		if sources.len() != self.properties.len() {
			return Err(ObservableError::BindingCountMismatch {
				bound: self.properties.len(),
				sources: sources.len(),
			});
		}
		let pairs = sources
			.iter()
			.map(|(source, property)| ((*source).clone(), (*property).into()))
			.collect();
		self.target.apply_binding(self.properties, pairs, None)
	}

	/// Binds a single chained property to a value computed from every
	/// `(source, property)` pair. The callback re-runs whenever any of them
	/// changes.
	pub fn to_computed(
		self,
		sources: &[(&Observable, &str)],
		callback: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
	) -> Result<(), ObservableError> {
		if self.properties.len() != 1 {
			return Err(ObservableError::CallbackWithMultipleTargets);
		}
		if sources.is_empty() {
			return Err(ObservableError::BindWithoutSources);
		}
		let pairs = sources
			.iter()
			.map(|(source, property)| ((*source).clone(), (*property).into()))
			.collect();
		self.target
			.apply_binding(self.properties, pairs, Some(Arc::new(callback)))
	}
}
