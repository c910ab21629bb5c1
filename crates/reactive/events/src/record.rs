//! Per-dispatch event records.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::emitter::Emitter;

/// Mutable-flags value object created for every dispatch.
///
/// Listeners receive a shared reference to the record and may:
/// - [`stop`](Self::stop) the dispatch, skipping the remaining listeners and
///   any delegation forwarding;
/// - [`off`](Self::off) themselves, deregistering the currently running
///   listener after it returns;
/// - [`set_return`](Self::set_return) a value that becomes the result of
///   `fire`.
///
/// Delegation creates a fresh record per destination (fresh flags and return
/// value) carrying the original source and the accumulated path.
pub struct EventRecord {
	source: Emitter,
	name: Box<str>,
	path: Mutex<Vec<Emitter>>,
	stop_requested: AtomicBool,
	off_requested: AtomicBool,
	stopped: AtomicBool,
	return_value: Mutex<Option<Value>>,
}

impl EventRecord {
	pub(crate) fn new(source: Emitter, name: &str) -> Self {
		Self {
			source,
			name: name.into(),
			path: Mutex::new(Vec::new()),
			stop_requested: AtomicBool::new(false),
			off_requested: AtomicBool::new(false),
			stopped: AtomicBool::new(false),
			return_value: Mutex::new(None),
		}
	}

	/// Fresh record for one delegation hop: same source, carried path,
	/// possibly renamed event, pristine flags and return value.
	pub(crate) fn delegated(&self, name: String) -> Self {
		Self {
			source: self.source.clone(),
			name: name.into(),
			path: Mutex::new(self.path.lock().clone()),
			stop_requested: AtomicBool::new(false),
			off_requested: AtomicBool::new(false),
			stopped: AtomicBool::new(false),
			return_value: Mutex::new(None),
		}
	}

	/// The emitter on which `fire` was originally called.
	#[inline]
	pub fn source(&self) -> &Emitter {
		&self.source
	}

	/// The event name for the current hop (delegation may rename per hop).
	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Emitters this event has traversed, delegation hops included.
	/// Always ends with the emitter currently executing listeners.
	pub fn path(&self) -> Vec<Emitter> {
		self.path.lock().clone()
	}

	/// Halt the remaining listeners of this dispatch and skip delegation.
	pub fn stop(&self) {
		self.stop_requested.store(true, Ordering::Relaxed);
	}

	/// Deregister the currently running listener once it returns.
	pub fn off(&self) {
		self.off_requested.store(true, Ordering::Relaxed);
	}

	/// Store the value `fire` will return. Later listeners may overwrite it.
	pub fn set_return(&self, value: Value) {
		*self.return_value.lock() = Some(value);
	}

	/// The value currently stored via [`set_return`](Self::set_return).
	pub fn return_value(&self) -> Option<Value> {
		self.return_value.lock().clone()
	}

	pub(crate) fn push_path(&self, emitter: Emitter) {
		self.path.lock().push(emitter);
	}

	pub(crate) fn take_stop(&self) -> bool {
		self.stop_requested.swap(false, Ordering::Relaxed)
	}

	pub(crate) fn take_off(&self) -> bool {
		self.off_requested.swap(false, Ordering::Relaxed)
	}

	pub(crate) fn mark_stopped(&self) {
		self.stopped.store(true, Ordering::Relaxed);
	}

	pub(crate) fn stopped(&self) -> bool {
		self.stopped.load(Ordering::Relaxed)
	}

	pub(crate) fn take_return(&self) -> Option<Value> {
		self.return_value.lock().take()
	}
}

impl std::fmt::Debug for EventRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventRecord")
			.field("name", &self.name)
			.field("source", &self.source)
			.field("path_len", &self.path.lock().len())
			.finish_non_exhaustive()
	}
}
