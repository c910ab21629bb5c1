//! Namespace tree for hierarchical event names.
//!
//! Event names may contain `:`-separated segments. Registering `a:b:c`
//! materializes placeholder nodes for `a:b` and `a` with parent→child links,
//! and every callback added to a node is replicated into all of its
//! descendants at registration time. Dispatch therefore reads a single
//! node's priority-ordered list instead of walking the tree.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::emitter::{EmitterInner, ListenerFn, ListenerId};

pub(crate) type NodeMap = FxHashMap<Box<str>, EventNode>;
pub(crate) type CallbackList = SmallVec<[ListenerEntry; 4]>;

/// One registration as stored in the tree. The same entry (same id) lives in
/// the node it was registered on and in every descendant node.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
	pub id: ListenerId,
	pub priority: i32,
	pub once: bool,
	/// The emitter that owns this registration (its listening-to index
	/// remembers the id). Self-removal paths scrub that index through it.
	pub owner: Weak<EmitterInner>,
	pub callback: Arc<ListenerFn>,
}

#[derive(Default)]
pub(crate) struct EventNode {
	/// Effective callbacks for firing this exact name, sorted by descending
	/// priority, ties in registration order.
	pub callbacks: CallbackList,
	/// Direct child event names (`a` → `a:b`).
	pub children: Vec<Box<str>>,
}

/// Ensures nodes exist for `name` and all its namespace prefixes.
///
/// A newly created node inherits a snapshot of the nearest existing
/// ancestor's callbacks, so listeners already registered on `a` apply to a
/// later-registered `a:b:c`.
pub(crate) fn create_namespace(map: &mut NodeMap, name: &str) {
	if map.contains_key(name) {
		return;
	}

	let mut created: Vec<Box<str>> = Vec::new();
	let mut current = name;
	let mut child: Option<Box<str>> = None;

	loop {
		if let Some(node) = map.get_mut(current) {
			if let Some(child_name) = child {
				node.children.push(child_name);
			}
			// Existing ancestor: seed every new node with its callbacks.
			let inherited = map[current].callbacks.clone();
			for created_name in &created {
				map.get_mut(created_name).expect("just created").callbacks = inherited.clone();
			}
			return;
		}

		let mut node = EventNode::default();
		if let Some(child_name) = child {
			node.children.push(child_name);
		}
		map.insert(current.into(), node);
		created.push(current.into());
		child = Some(current.into());

		match current.rfind(':') {
			Some(pos) => current = &name[..pos],
			None => return,
		}
	}
}

/// `name` plus all registered descendants, depth-first.
pub(crate) fn namespace_names(map: &NodeMap, name: &str) -> Vec<Box<str>> {
	let mut names: Vec<Box<str>> = vec![name.into()];
	let mut i = 0;
	while i < names.len() {
		if let Some(node) = map.get(&names[i]) {
			names.extend(node.children.iter().cloned());
		}
		i += 1;
	}
	names
}

/// Inserts `entry` into the node for `event` and all of its descendants,
/// keeping each list sorted by descending priority with stable ties.
pub(crate) fn insert_listener(map: &mut NodeMap, event: &str, entry: ListenerEntry) {
	create_namespace(map, event);
	for name in namespace_names(map, event) {
		let callbacks = &mut map.get_mut(&name).expect("namespace node exists").callbacks;
		let pos = callbacks.partition_point(|e| e.priority >= entry.priority);
		callbacks.insert(pos, entry.clone());
	}
}

/// Removes the registration `id` from every node it appears in.
pub(crate) fn remove_listener(map: &mut NodeMap, id: ListenerId) {
	for node in map.values_mut() {
		node.callbacks.retain(|entry| entry.id != id);
	}
}

/// Snapshot of the callback list that firing `name` should run.
///
/// Falls back to the nearest namespace ancestor with a non-empty list, so
/// firing `a:x` with listeners only on `a` still invokes them. Returns the
/// resolved node name alongside, for liveness re-checks during dispatch.
pub(crate) fn resolve_callbacks(map: &NodeMap, name: &str) -> Option<(Box<str>, CallbackList)> {
	let mut current = name;
	loop {
		match map.get(current) {
			Some(node) if !node.callbacks.is_empty() => {
				return Some((current.into(), node.callbacks.clone()));
			}
			_ => match current.rfind(':') {
				Some(pos) => current = &current[..pos],
				None => return None,
			},
		}
	}
}

/// Whether registration `id` is still present on the node for `name`.
pub(crate) fn is_registered(map: &NodeMap, name: &str, id: ListenerId) -> bool {
	map.get(name)
		.is_some_and(|node| node.callbacks.iter().any(|entry| entry.id == id))
}
