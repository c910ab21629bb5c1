//! The emitter: listener registration and synchronous dispatch.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::delegate::{DelegateChain, Delegation};
use crate::node::{self, ListenerEntry, NodeMap};
use crate::priority::Priority;
use crate::record::EventRecord;

/// Identifies one listener registration; returned by `on`/`once`/`listen_to`
/// and accepted by `off`.
pub type ListenerId = u64;

/// Closure type for event listeners.
pub type ListenerFn = dyn Fn(&EventRecord, &[Value]) + Send + Sync;

static NEXT_EMITTER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// A cheap cloneable handle to one emitter. Clones share identity.
///
/// All state lives behind short-lived mutexes that are never held while a
/// listener callback runs, so listeners may freely call back into the same
/// emitter (register, deregister, re-fire) during a dispatch.
#[derive(Clone)]
pub struct Emitter {
	inner: Arc<EmitterInner>,
}

pub(crate) struct EmitterInner {
	id: u64,
	/// Namespace tree holding the canonical callback lists that dispatch reads.
	events: Mutex<NodeMap>,
	/// Registrations this emitter owns on other emitters (and on itself),
	/// keyed by callee emitter id. Owned by the listening side; only it may
	/// remove them.
	listening: Mutex<FxHashMap<u64, ListeningTo>>,
	/// Forwarding table: event name (or `"*"`) → destinations.
	delegations: Mutex<FxHashMap<Box<str>, Vec<Delegation>>>,
}

struct ListeningTo {
	emitter: Weak<EmitterInner>,
	/// Event name → listener ids registered under it.
	events: FxHashMap<Box<str>, Vec<ListenerId>>,
}

impl Emitter {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(EmitterInner {
				id: NEXT_EMITTER_ID.fetch_add(1, Ordering::Relaxed),
				events: Mutex::new(NodeMap::default()),
				listening: Mutex::new(FxHashMap::default()),
				delegations: Mutex::new(FxHashMap::default()),
			}),
		}
	}

	pub(crate) fn from_inner(inner: Arc<EmitterInner>) -> Self {
		Self { inner }
	}

	pub(crate) fn downgrade(&self) -> Weak<EmitterInner> {
		Arc::downgrade(&self.inner)
	}

	/// Stable identity of this emitter (shared by all clones of the handle).
	#[inline]
	pub fn id(&self) -> u64 {
		self.inner.id
	}

	/// Registers `callback` for `event` at [`Priority::NORMAL`].
	pub fn on(
		&self,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(self, event, Priority::NORMAL, false, Arc::new(callback))
	}

	/// Registers `callback` for `event` at the given priority.
	pub fn on_prio(
		&self,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(self, event, priority, false, Arc::new(callback))
	}

	/// Registers `callback` to run at most once.
	///
	/// The registration is removed before the callback is invoked, so a
	/// callback that re-fires the same event never runs a second time.
	pub fn once(
		&self,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(self, event, Priority::NORMAL, true, Arc::new(callback))
	}

	/// One-shot registration at the given priority.
	pub fn once_prio(
		&self,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(self, event, priority, true, Arc::new(callback))
	}

	/// Registers `callback` on `other`, recording the registration on this
	/// side so it can later be removed without `other`'s cooperation.
	pub fn listen_to(
		&self,
		other: &Emitter,
		event: &str,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(other, event, Priority::NORMAL, false, Arc::new(callback))
	}

	/// [`listen_to`](Self::listen_to) at the given priority.
	pub fn listen_to_prio(
		&self,
		other: &Emitter,
		event: &str,
		priority: Priority,
		callback: impl Fn(&EventRecord, &[Value]) + Send + Sync + 'static,
	) -> ListenerId {
		self.register(other, event, priority, false, Arc::new(callback))
	}

	fn register(
		&self,
		callee: &Emitter,
		event: &str,
		priority: Priority,
		once: bool,
		callback: Arc<ListenerFn>,
	) -> ListenerId {
		let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
		let entry = ListenerEntry {
			id,
			priority: priority.value(),
			once,
			owner: self.downgrade(),
			callback,
		};

		{
			let mut events = callee.inner.events.lock();
			node::insert_listener(&mut events, event, entry);
		}
		{
			let mut listening = self.inner.listening.lock();
			listening
				.entry(callee.id())
				.or_insert_with(|| ListeningTo {
					emitter: callee.downgrade(),
					events: FxHashMap::default(),
				})
				.events
				.entry(event.into())
				.or_default()
				.push(id);
		}

		id
	}

	/// Removes one registration owned by this emitter. No-op if unknown.
	pub fn off(&self, id: ListenerId) {
		let callee = {
			let mut listening = self.inner.listening.lock();
			let mut found = None;
			listening.retain(|_, to| {
				let mut owned = false;
				to.events.retain(|_, ids| {
					if let Some(pos) = ids.iter().position(|&i| i == id) {
						ids.remove(pos);
						owned = true;
					}
					!ids.is_empty()
				});
				if owned {
					found = Some(to.emitter.clone());
				}
				!to.events.is_empty()
			});
			found
		};
		if let Some(inner) = callee.and_then(|weak| weak.upgrade()) {
			node::remove_listener(&mut inner.events.lock(), id);
		}
	}

	/// Removes every registration this emitter owns on `other`. No-op safe.
	pub fn stop_listening(&self, other: &Emitter) {
		let ids: Vec<ListenerId> = {
			let mut listening = self.inner.listening.lock();
			match listening.remove(&other.id()) {
				Some(to) => to.events.into_values().flatten().collect(),
				None => return,
			}
		};
		let mut events = other.inner.events.lock();
		for id in ids {
			node::remove_listener(&mut events, id);
		}
	}

	/// Removes this emitter's registrations for one event on `other`.
	pub fn stop_listening_event(&self, other: &Emitter, event: &str) {
		let ids: Vec<ListenerId> = {
			let mut listening = self.inner.listening.lock();
			let Some(to) = listening.get_mut(&other.id()) else {
				return;
			};
			let ids = to.events.remove(event).unwrap_or_default();
			if to.events.is_empty() {
				listening.remove(&other.id());
			}
			ids
		};
		let mut events = other.inner.events.lock();
		for id in ids {
			node::remove_listener(&mut events, id);
		}
	}

	/// Removes every registration this emitter owns, everywhere.
	pub fn stop_listening_all(&self) {
		let taken: Vec<(Weak<EmitterInner>, Vec<ListenerId>)> = {
			let mut listening = self.inner.listening.lock();
			listening
				.drain()
				.map(|(_, to)| (to.emitter, to.events.into_values().flatten().collect()))
				.collect()
		};
		for (weak, ids) in taken {
			if let Some(inner) = weak.upgrade() {
				let mut events = inner.events.lock();
				for id in ids {
					node::remove_listener(&mut events, id);
				}
			}
		}
	}

	/// Fires `event` synchronously and returns the record's return value.
	///
	/// Listeners run in priority order (ties in registration order) in a
	/// single pass over the union of this event's namespace levels.
	/// Listeners registered during the dispatch do not run in it; listeners
	/// removed during the dispatch stop running immediately. A panic in a
	/// listener propagates to the caller.
	pub fn fire(&self, event: &str, args: &[Value]) -> Option<Value> {
		let record = EventRecord::new(self.clone(), event);
		self.dispatch(&record, args);
		record.take_return()
	}

	pub(crate) fn dispatch(&self, record: &EventRecord, args: &[Value]) {
		record.push_path(self.clone());

		let resolved = {
			let events = self.inner.events.lock();
			node::resolve_callbacks(&events, record.name())
		};

		if let Some((node_name, snapshot)) = resolved {
			trace!(event = record.name(), listeners = snapshot.len(), "dispatch");
			for entry in snapshot {
				// Removed mid-dispatch by an earlier listener: skip.
				if !node::is_registered(&self.inner.events.lock(), &node_name, entry.id) {
					continue;
				}
				// One-shot listeners deregister before running, so a nested
				// re-fire of the same event cannot run them twice.
				if entry.once {
					self.deregister(&entry);
				}
				(entry.callback)(record, args);
				if record.take_off() && !entry.once {
					self.deregister(&entry);
				}
				if record.take_stop() {
					record.mark_stopped();
					break;
				}
			}
		}

		if !record.stopped() {
			self.dispatch_delegations(record, args);
		}
	}

	/// Removes `entry` from this emitter's tree and forgets the id in the
	/// owning emitter's listening-to index.
	fn deregister(&self, entry: &ListenerEntry) {
		node::remove_listener(&mut self.inner.events.lock(), entry.id);
		if let Some(owner) = entry.owner.upgrade() {
			let mut listening = owner.listening.lock();
			if let Some(to) = listening.get_mut(&self.inner.id) {
				to.events.retain(|_, ids| {
					ids.retain(|&id| id != entry.id);
					!ids.is_empty()
				});
				if to.events.is_empty() {
					listening.remove(&self.inner.id);
				}
			}
		}
	}

	/// How many registrations this emitter currently owns, everywhere.
	#[cfg(test)]
	pub(crate) fn owned_registrations(&self) -> usize {
		self.inner
			.listening
			.lock()
			.values()
			.map(|to| to.events.values().map(Vec::len).sum::<usize>())
			.sum()
	}

	/// Begins a delegation declaration for the given event names.
	///
	/// `"*"` delegates every event fired on this emitter.
	#[must_use = "delegation is installed by the chain's `to*` methods"]
	pub fn delegate(&self, events: &[&str]) -> DelegateChain<'_> {
		DelegateChain::new(self, events)
	}

	/// Clears the whole delegation table.
	pub fn stop_delegating(&self) {
		self.inner.delegations.lock().clear();
	}

	/// Stops delegating one event to all of its destinations.
	pub fn stop_delegating_event(&self, event: &str) {
		self.inner.delegations.lock().remove(event);
	}

	/// Stops delegating one event to one destination. No-op safe.
	pub fn stop_delegating_to(&self, event: &str, dest: &Emitter) {
		let mut delegations = self.inner.delegations.lock();
		if let Some(list) = delegations.get_mut(event) {
			list.retain(|d| d.dest_id != dest.id());
			if list.is_empty() {
				delegations.remove(event);
			}
		}
	}

	pub(crate) fn install_delegation(&self, event: &str, delegation: Delegation) {
		let mut delegations = self.inner.delegations.lock();
		let list = delegations.entry(event.into()).or_default();
		// Re-delegating to the same destination replaces its rename.
		match list.iter_mut().find(|d| d.dest_id == delegation.dest_id) {
			Some(existing) => *existing = delegation,
			None => list.push(delegation),
		}
	}

	fn dispatch_delegations(&self, record: &EventRecord, args: &[Value]) {
		let destinations: Vec<(Arc<EmitterInner>, String)> = {
			let delegations = self.inner.delegations.lock();
			let mut collected = Vec::new();
			for key in [record.name(), "*"] {
				if let Some(list) = delegations.get(key) {
					for delegation in list {
						if let Some(inner) = delegation.dest.upgrade() {
							collected.push((inner, delegation.rename(record.name())));
						}
					}
				}
			}
			collected
		};

		for (inner, name) in destinations {
			let dest = Emitter::from_inner(inner);
			let forwarded = record.delegated(name);
			dest.dispatch(&forwarded, args);
		}
	}
}

impl Default for Emitter {
	fn default() -> Self {
		Self::new()
	}
}

impl PartialEq for Emitter {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Emitter {}

impl std::fmt::Debug for Emitter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Emitter").field(&self.inner.id).finish()
	}
}
