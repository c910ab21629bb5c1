//! Skip-aware synchronization between collections.
//!
//! `target.bind_to(&source)` keeps `target` populated with items derived
//! from `source` through a transform. A transform may decline an item
//! (return `None`); the source index of every declined item is kept in a
//! skip ledger so later inserts still land at the right position. Binding
//! two collections at each other yields two-way synchronization: an add
//! that merely mirrors one of our own items is recognized through the
//! identity maps and only recorded, never re-added, which is what stops
//! the loop.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;
use vellum_events::Emits;

use crate::collection::{Collection, value_kind};
use crate::error::CollectionError;

/// Closure deriving a bound item from a source item. `None` skips the item.
pub type TransformFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

pub(crate) struct BindingState {
	pub source: Collection,
	pub transform: Arc<TransformFn>,
	/// Source item id -> own item id.
	pub external_to_internal: FxHashMap<Box<str>, Box<str>>,
	/// Own item id -> source item id.
	pub internal_to_external: FxHashMap<Box<str>, Box<str>>,
	/// Source indices whose items the transform declined, ascending.
	pub skipped: Vec<usize>,
}

/// Second half of the `bind_to(..)` call chain.
#[must_use = "a bind chain does nothing until a transform is chosen"]
pub struct CollectionBindChain {
	target: Collection,
	source: Collection,
}

impl Collection {
	/// Starts synchronizing this collection from `source`.
	///
	/// Finish the chain with [`CollectionBindChain::using`] (free-form
	/// transform), [`CollectionBindChain::using_key`] (project one field) or
	/// [`CollectionBindChain::wrap`] (nest each source item under a field).
	/// Existing source items are synchronized immediately; the binding lasts
	/// until [`clear`](Collection::clear).
	pub fn bind_to(&self, source: &Collection) -> Result<CollectionBindChain, CollectionError> {
		if self.is_bound() {
			return Err(CollectionError::AlreadyBound);
		}
		Ok(CollectionBindChain {
			target: self.clone(),
			source: source.clone(),
		})
	}
}

impl CollectionBindChain {
	/// Synchronizes through an arbitrary transform. Returning `None` skips
	/// the source item.
	pub fn using(
		self,
		transform: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
	) -> Result<(), CollectionError> {
		install(self.target, self.source, Arc::new(transform))
	}

	/// Synchronizes by projecting one field of each source item. Items
	/// without the field (or with a null there) are skipped.
	pub fn using_key(self, key: &str) -> Result<(), CollectionError> {
		let key = key.to_owned();
		install(
			self.target,
			self.source,
			Arc::new(move |item: &Value| match item.get(&key) {
				None | Some(Value::Null) => None,
				Some(value) => Some(value.clone()),
			}),
		)
	}

	/// Synchronizes by nesting each source item under `key` in a fresh
	/// object.
	pub fn wrap(self, key: &str) -> Result<(), CollectionError> {
		let key = key.to_owned();
		install(
			self.target,
			self.source,
			Arc::new(move |item: &Value| Some(json!({ &key: item.clone() }))),
		)
	}
}

fn install(
	target: Collection,
	source: Collection,
	transform: Arc<TransformFn>,
) -> Result<(), CollectionError> {
	{
		let mut binding = target.inner.binding.lock();
		if binding.is_some() {
			return Err(CollectionError::AlreadyBound);
		}
		*binding = Some(BindingState {
			source: source.clone(),
			transform,
			external_to_internal: FxHashMap::default(),
			internal_to_external: FxHashMap::default(),
			skipped: Vec::new(),
		});
	}

	// Initial load before live listeners, so our own `add` fires do not
	// re-enter the handlers of a not-yet-consistent state.
	for (index, item) in source.items().into_iter().enumerate() {
		sync_add(&target, &source, &item, index);
	}

	let target_ref = target.downgrade();
	let source_ref = source.downgrade();
	target.listen_to(&source, "add", move |_record, args| {
		let (Some(target), Some(source)) = (target_ref.upgrade(), source_ref.upgrade()) else {
			return;
		};
		let target = Collection::from_inner(target);
		let source = Collection::from_inner(source);
		let (Some(item), Some(index)) = (args.first(), args.get(1).and_then(Value::as_u64))
		else {
			return;
		};
		sync_add(&target, &source, item, index as usize);
	});

	let target_ref = target.downgrade();
	target.listen_to(&source, "remove", move |_record, args| {
		let Some(target) = target_ref.upgrade() else {
			return;
		};
		let target = Collection::from_inner(target);
		let (Some(item), Some(index)) = (args.first(), args.get(1).and_then(Value::as_u64))
		else {
			return;
		};
		sync_remove(&target, item, index as usize);
	});

	Ok(())
}

/// Mirrors one source insertion into the bound collection.
fn sync_add(target: &Collection, source: &Collection, item: &Value, index: usize) {
	let Some(external_id) = item.get(source.id_key()).and_then(Value::as_str) else {
		return;
	};

	// An add on the source that itself mirrors one of our items (two-way
	// setup) must only be recorded, not mirrored back.
	let echo_of = {
		let source_binding = source.inner.binding.lock();
		match source_binding.as_ref() {
			Some(state) if state.source == *target => {
				state.internal_to_external.get(external_id).cloned()
			}
			_ => None,
		}
	};
	let remote_skipped: Vec<usize> = {
		let source_binding = source.inner.binding.lock();
		source_binding
			.as_ref()
			.filter(|state| state.source == *target)
			.map(|state| state.skipped.clone())
			.unwrap_or_default()
	};

	let transform = {
		let mut binding = target.inner.binding.lock();
		let Some(state) = binding.as_mut() else {
			return;
		};

		// The source grew at `index`; ledger entries at or past it shift.
		for skipped in state.skipped.iter_mut() {
			if *skipped >= index {
				*skipped += 1;
			}
		}

		if let Some(own_id) = echo_of {
			state
				.external_to_internal
				.insert(external_id.into(), own_id.clone());
			state.internal_to_external.insert(own_id, external_id.into());
			return;
		}

		state.transform.clone()
	};

	// The transform may call back into either collection, so it runs with
	// no binding lock held.
	let Some(mut produced) = transform(item) else {
		record_skip(target, index);
		return;
	};
	let internal_id: Box<str> = match produced.as_object_mut() {
		Some(map) => match map.get(target.id_key()) {
			Some(Value::String(id)) => id.as_str().into(),
			Some(other) => {
				warn!(
					source_id = external_id,
					found = value_kind(other),
					"bound transform produced a non-string id, skipping item"
				);
				record_skip(target, index);
				return;
			}
			None => {
				let id = Uuid::new_v4().to_string();
				map.insert(target.id_key().to_owned(), json!(id));
				id.into()
			}
		},
		None => {
			warn!(
				source_id = external_id,
				found = value_kind(&produced),
				"bound transform produced a non-object, skipping item"
			);
			record_skip(target, index);
			return;
		}
	};

	let final_index = {
		let mut binding = target.inner.binding.lock();
		let Some(state) = binding.as_mut() else {
			return;
		};
		let mut final_index = index - state.skipped.iter().filter(|s| **s < index).count();
		for skipped in &remote_skipped {
			if final_index >= *skipped {
				final_index += 1;
			}
		}
		// Identity registered before the add so the opposite handler sees
		// the echo.
		state
			.external_to_internal
			.insert(external_id.into(), internal_id.clone());
		state
			.internal_to_external
			.insert(internal_id.clone(), external_id.into());
		final_index
	};

	if let Err(err) = target.add_at(produced, final_index) {
		warn!(source_id = external_id, %err, "bound item rejected, skipping");
		let mut binding = target.inner.binding.lock();
		if let Some(state) = binding.as_mut() {
			state.external_to_internal.remove(external_id);
			state.internal_to_external.remove(&internal_id);
			let at = state.skipped.partition_point(|s| *s < index);
			state.skipped.insert(at, index);
		}
	}
}

fn record_skip(target: &Collection, index: usize) {
	let mut binding = target.inner.binding.lock();
	if let Some(state) = binding.as_mut() {
		let at = state.skipped.partition_point(|s| *s < index);
		state.skipped.insert(at, index);
	}
}

/// Mirrors one source removal into the bound collection.
fn sync_remove(target: &Collection, item: &Value, index: usize) {
	let internal_id = {
		let mut binding = target.inner.binding.lock();
		let Some(state) = binding.as_mut() else {
			return;
		};

		// The source shrank at `index`; drop a matching skip, shift later
		// ones down.
		let mut kept = Vec::with_capacity(state.skipped.len());
		for skipped in state.skipped.drain(..) {
			if skipped < index {
				kept.push(skipped);
			} else if skipped > index {
				kept.push(skipped - 1);
			}
		}
		state.skipped = kept;

		let Some(external_id) = item
			.get(state.source.id_key())
			.and_then(Value::as_str)
		else {
			return;
		};
		// Maps are scrubbed before the mirrored removal; the opposite
		// handler then finds nothing and the cascade stops.
		match state.external_to_internal.remove(external_id) {
			Some(internal_id) => {
				state.internal_to_external.remove(&internal_id);
				internal_id
			}
			None => return,
		}
	};

	if target.has(&*internal_id) {
		if let Err(err) = target.remove(&*internal_id) {
			warn!(id = %internal_id, %err, "bound removal failed");
		}
	}
}
