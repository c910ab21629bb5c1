//! Ordered, id-indexed item store with change events.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use uuid::Uuid;
use vellum_events::{Emits, Emitter};

use crate::bind::BindingState;
use crate::error::CollectionError;

/// Lookup key for reading or removing one item.
#[derive(Debug, Clone, Copy)]
pub enum ItemKey<'a> {
	Id(&'a str),
	Index(usize),
}

impl<'a> From<&'a str> for ItemKey<'a> {
	fn from(id: &'a str) -> Self {
		Self::Id(id)
	}
}

impl From<usize> for ItemKey<'_> {
	fn from(index: usize) -> Self {
		Self::Index(index)
	}
}

/// A cheap cloneable handle to one ordered collection. Clones share identity.
///
/// Items are JSON objects indexed by a string id stored on the item itself
/// (under [`id_key`](Self::id_key), `"id"` unless overridden). An item added
/// without an id gets a generated one; generated ids are globally unique and
/// never reused. Every mutation fires events through the embedded emitter:
/// `add` and `remove` carry `(item, index)` per item, and each public
/// mutation is summarized by one aggregate `change` event.
#[derive(Clone)]
pub struct Collection {
	pub(crate) inner: Arc<CollectionInner>,
}

pub(crate) struct CollectionInner {
	pub emitter: Emitter,
	pub id_key: Box<str>,
	pub state: Mutex<CollectionState>,
	pub binding: Mutex<Option<BindingState>>,
}

#[derive(Default)]
pub(crate) struct CollectionState {
	pub order: Vec<Box<str>>,
	pub by_id: FxHashMap<Box<str>, Value>,
}

impl Collection {
	pub fn new() -> Self {
		Self::with_id_key("id")
	}

	/// A collection whose items carry their id under `key` instead of `"id"`.
	pub fn with_id_key(key: &str) -> Self {
		Self {
			inner: Arc::new(CollectionInner {
				emitter: Emitter::new(),
				id_key: key.into(),
				state: Mutex::new(CollectionState::default()),
				binding: Mutex::new(None),
			}),
		}
	}

	pub(crate) fn downgrade(&self) -> Weak<CollectionInner> {
		Arc::downgrade(&self.inner)
	}

	pub(crate) fn from_inner(inner: Arc<CollectionInner>) -> Self {
		Self { inner }
	}

	#[inline]
	pub fn id_key(&self) -> &str {
		&self.inner.id_key
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.inner.state.lock().order.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.inner.state.lock().order.is_empty()
	}

	/// Appends an item and returns its id.
	pub fn add(&self, item: Value) -> Result<String, CollectionError> {
		let index = self.len();
		self.add_at(item, index)
	}

	/// Inserts an item at `index` and returns its id.
	pub fn add_at(&self, item: Value, index: usize) -> Result<String, CollectionError> {
		let (id, stored) = {
			let mut state = self.inner.state.lock();
			if index > state.order.len() {
				return Err(CollectionError::IndexOutOfRange {
					index,
					len: state.order.len(),
				});
			}
			let (id, stored) = prepare_item(&self.inner.id_key, item)?;
			if state.by_id.contains_key(&id) {
				return Err(CollectionError::DuplicateId(id));
			}
			state.order.insert(index, id.clone());
			state.by_id.insert(id.clone(), stored.clone());
			(id, stored)
		};
		self.fire("add", &[stored.clone(), json!(index)]);
		self.fire(
			"change",
			&[json!({ "added": [stored], "removed": [], "index": index })],
		);
		Ok(id.into_string())
	}

	/// Inserts a batch of items, appending when `index` is `None`.
	///
	/// The whole batch is validated first; on error nothing is applied.
	/// Fires one `add` per item and a single aggregate `change`.
	pub fn add_many(
		&self,
		items: Vec<Value>,
		index: Option<usize>,
	) -> Result<Vec<String>, CollectionError> {
		let (at, stored) = {
			let mut state = self.inner.state.lock();
			let at = index.unwrap_or(state.order.len());
			if at > state.order.len() {
				return Err(CollectionError::IndexOutOfRange {
					index: at,
					len: state.order.len(),
				});
			}
			let mut prepared: Vec<(Box<str>, Value)> = Vec::with_capacity(items.len());
			for item in items {
				let (id, stored) = prepare_item(&self.inner.id_key, item)?;
				if state.by_id.contains_key(&id) || prepared.iter().any(|(seen, _)| *seen == id) {
					return Err(CollectionError::DuplicateId(id));
				}
				prepared.push((id, stored));
			}
			for (offset, (id, stored)) in prepared.iter().enumerate() {
				state.order.insert(at + offset, id.clone());
				state.by_id.insert(id.clone(), stored.clone());
			}
			(at, prepared)
		};
		for (offset, (_, item)) in stored.iter().enumerate() {
			self.fire("add", &[item.clone(), json!(at + offset)]);
		}
		let added: Vec<Value> = stored.iter().map(|(_, item)| item.clone()).collect();
		self.fire(
			"change",
			&[json!({ "added": added, "removed": [], "index": at })],
		);
		Ok(stored.into_iter().map(|(id, _)| id.into_string()).collect())
	}

	pub fn get<'a>(&self, key: impl Into<ItemKey<'a>>) -> Option<Value> {
		let state = self.inner.state.lock();
		match key.into() {
			ItemKey::Id(id) => state.by_id.get(id).cloned(),
			ItemKey::Index(index) => {
				let id = state.order.get(index)?;
				state.by_id.get(id).cloned()
			}
		}
	}

	pub fn has<'a>(&self, key: impl Into<ItemKey<'a>>) -> bool {
		let state = self.inner.state.lock();
		match key.into() {
			ItemKey::Id(id) => state.by_id.contains_key(id),
			ItemKey::Index(index) => index < state.order.len(),
		}
	}

	/// Position of the item with the given id.
	pub fn get_index(&self, id: &str) -> Option<usize> {
		self.inner
			.state
			.lock()
			.order
			.iter()
			.position(|other| &**other == id)
	}

	/// Snapshot of all items in order.
	pub fn items(&self) -> Vec<Value> {
		let state = self.inner.state.lock();
		state
			.order
			.iter()
			.filter_map(|id| state.by_id.get(id).cloned())
			.collect()
	}

	pub fn map<T>(&self, f: impl FnMut(&Value) -> T) -> Vec<T> {
		self.items().iter().map(f).collect()
	}

	pub fn find(&self, mut pred: impl FnMut(&Value) -> bool) -> Option<Value> {
		self.items().into_iter().find(|item| pred(item))
	}

	pub fn filter(&self, mut pred: impl FnMut(&Value) -> bool) -> Vec<Value> {
		self.items().into_iter().filter(|item| pred(item)).collect()
	}

	/// Removes one item by id or index and returns it.
	pub fn remove<'a>(&self, key: impl Into<ItemKey<'a>>) -> Result<Value, CollectionError> {
		let (item, index) = self.remove_inner(key.into())?;
		self.fire(
			"change",
			&[json!({ "added": [], "removed": [item.clone()], "index": index })],
		);
		Ok(item)
	}

	/// Removes, fires `remove`, but leaves the aggregate `change` to the
	/// caller.
	fn remove_inner(&self, key: ItemKey<'_>) -> Result<(Value, usize), CollectionError> {
		let (item, index) = {
			let mut state = self.inner.state.lock();
			let index = match key {
				ItemKey::Id(id) => state
					.order
					.iter()
					.position(|other| &**other == id)
					.ok_or_else(|| CollectionError::NotFound(id.into()))?,
				ItemKey::Index(index) => {
					if index >= state.order.len() {
						return Err(CollectionError::NotFound(
							index.to_string().into_boxed_str(),
						));
					}
					index
				}
			};
			let id = state.order.remove(index);
			let item = state
				.by_id
				.remove(&id)
				.ok_or_else(|| CollectionError::NotFound(id.clone()))?;
			(item, index)
		};
		self.fire("remove", &[item.clone(), json!(index)]);
		Ok((item, index))
	}

	/// Removes every item and severs an active binding.
	///
	/// Fires `remove` per item and one aggregate `change` at the end.
	pub fn clear(&self) {
		self.sever_binding();
		let removed: Vec<Value> = self.items();
		for _ in 0..removed.len() {
			// Ignoring NotFound: the collection only shrinks under us if a
			// remove listener removed further items re-entrantly.
			let _ = self.remove_inner(ItemKey::Index(0));
		}
		self.fire(
			"change",
			&[json!({ "added": [], "removed": removed, "index": 0 })],
		);
	}

	/// Whether this collection currently synchronizes from a source.
	pub fn is_bound(&self) -> bool {
		self.inner.binding.lock().is_some()
	}

	pub(crate) fn sever_binding(&self) {
		let state = self.inner.binding.lock().take();
		if let Some(state) = state {
			self.stop_listening(&state.source);
		}
	}
}

/// Validates an item and ensures it carries a string id under `id_key`,
/// generating one when absent.
fn prepare_item(id_key: &str, mut item: Value) -> Result<(Box<str>, Value), CollectionError> {
	let Some(map) = item.as_object_mut() else {
		return Err(CollectionError::InvalidItem(value_kind(&item)));
	};
	let id: Box<str> = match map.get(id_key) {
		Some(Value::String(id)) => id.as_str().into(),
		Some(other) => {
			return Err(CollectionError::InvalidId {
				key: id_key.into(),
				found: value_kind(other),
			});
		}
		None => {
			let id = Uuid::new_v4().to_string();
			map.insert(id_key.to_owned(), json!(id));
			id.into()
		}
	};
	Ok((id, item))
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

impl Default for Collection {
	fn default() -> Self {
		Self::new()
	}
}

impl Emits for Collection {
	fn emitter(&self) -> &Emitter {
		&self.inner.emitter
	}
}

impl PartialEq for Collection {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Collection {}

impl std::fmt::Debug for Collection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Collection")
			.field("len", &self.len())
			.field("bound", &self.is_bound())
			.finish()
	}
}
