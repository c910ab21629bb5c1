//! Reactive property store.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use vellum_events::{Emits, Emitter};

use crate::bind::BindingTable;
use crate::error::ObservableError;

/// Closure type for defined methods (see [`Observable::define_method`]).
pub type MethodFn = dyn Fn(&[Value]) -> Option<Value> + Send + Sync;

pub(crate) struct MethodSlot {
	pub original: Arc<MethodFn>,
	pub decorated: bool,
}

/// A cheap cloneable handle to one observable object. Clones share identity.
///
/// An observable owns an [`Emitter`] (exposed through [`Emits`]) and a store
/// of reactive properties. Writing a property through [`set`](Self::set)
/// fires `set:<name>` (whose listeners may override the stored value via the
/// record's return value) and, when the value actually changes,fires
/// `change:<name>` with `(name, new, old)`. Generic `change` listeners ride
/// the event namespace mechanism.
#[derive(Clone)]
pub struct Observable {
	pub(crate) inner: Arc<ObservableInner>,
}

pub(crate) struct ObservableInner {
	pub emitter: Emitter,
	pub properties: Mutex<FxHashMap<Box<str>, Value>>,
	pub methods: Mutex<FxHashMap<Box<str>, MethodSlot>>,
	pub bindings: Mutex<BindingTable>,
}

impl Observable {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ObservableInner {
				emitter: Emitter::new(),
				properties: Mutex::new(FxHashMap::default()),
				methods: Mutex::new(FxHashMap::default()),
				bindings: Mutex::new(BindingTable::default()),
			}),
		}
	}

	pub(crate) fn downgrade(&self) -> Weak<ObservableInner> {
		Arc::downgrade(&self.inner)
	}

	pub(crate) fn from_inner(inner: Arc<ObservableInner>) -> Self {
		Self { inner }
	}

	/// Declares (first call) or updates a reactive property.
	///
	/// Change notification only fires when the new value differs from the
	/// stored one, or when the property had no prior value — this comparison
	/// is also what terminates two-way binding cascades.
	pub fn set(&self, name: &str, value: Value) -> Result<(), ObservableError> {
		if self.inner.methods.lock().contains_key(name) {
			return Err(ObservableError::PropertyCollidesWithMethod(name.into()));
		}

		let old = self.inner.properties.lock().get(name).cloned();
		let old_arg = old.clone().unwrap_or(Value::Null);

		// `set:<name>` listeners may substitute the value actually stored.
		let overridden = self.fire(
			&format!("set:{name}"),
			&[json!(name), value.clone(), old_arg.clone()],
		);
		let new_value = overridden.unwrap_or(value);

		let changed = match &old {
			None => true,
			Some(prev) => *prev != new_value,
		};
		if changed {
			self.inner
				.properties
				.lock()
				.insert(name.into(), new_value.clone());
			self.fire(&format!("change:{name}"), &[json!(name), new_value, old_arg]);
		}
		Ok(())
	}

	/// Sets several properties in order; stops at the first error.
	pub fn set_many(&self, pairs: &[(&str, Value)]) -> Result<(), ObservableError> {
		for (name, value) in pairs {
			self.set(name, value.clone())?;
		}
		Ok(())
	}

	/// Current value of a reactive property.
	pub fn get(&self, name: &str) -> Option<Value> {
		self.inner.properties.lock().get(name).cloned()
	}

	#[inline]
	pub fn has(&self, name: &str) -> bool {
		self.inner.properties.lock().contains_key(name)
	}

	/// Registers a named callable member.
	///
	/// Plain (non-decorated) methods run directly via [`invoke`](Self::invoke);
	/// [`decorate`](Self::decorate) re-routes them through an event.
	pub fn define_method(
		&self,
		name: &str,
		method: impl Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
	) -> Result<(), ObservableError> {
		if self.inner.properties.lock().contains_key(name) {
			return Err(ObservableError::MethodCollidesWithProperty(name.into()));
		}
		let mut methods = self.inner.methods.lock();
		if methods.contains_key(name) {
			return Err(ObservableError::MethodAlreadyDefined(name.into()));
		}
		methods.insert(
			name.into(),
			MethodSlot {
				original: Arc::new(method),
				decorated: false,
			},
		);
		Ok(())
	}

	/// Calls a defined method.
	///
	/// For a decorated method this fires the same-named event and returns the
	/// record's return value, so listeners may observe, override or cancel
	/// the call (see [`decorate`](Self::decorate)).
	pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Option<Value>, ObservableError> {
		let (original, decorated) = {
			let methods = self.inner.methods.lock();
			let slot = methods
				.get(name)
				.ok_or_else(|| ObservableError::UnknownMethod(name.into()))?;
			(slot.original.clone(), slot.decorated)
		};
		if decorated {
			Ok(self.fire(name, args))
		} else {
			Ok(original(args))
		}
	}

	/// Re-routes a defined method through the event system.
	///
	/// A default listener at [`Priority::NORMAL`](vellum_events::Priority)
	/// runs the original implementation and stores its result as the event's
	/// return value. Listeners at higher priority may inspect the arguments,
	/// pre-set the return value, or `stop()` the record to cancel the
	/// original entirely; listeners at lower priority may override the
	/// result.
	pub fn decorate(&self, name: &str) -> Result<(), ObservableError> {
		let original = {
			let mut methods = self.inner.methods.lock();
			let slot = methods
				.get_mut(name)
				.ok_or_else(|| ObservableError::DecorateUnknownMethod(name.into()))?;
			if slot.decorated {
				return Err(ObservableError::MethodAlreadyDecorated(name.into()));
			}
			slot.decorated = true;
			slot.original.clone()
		};
		self.on(name, move |record, args| {
			if let Some(value) = original(args) {
				record.set_return(value);
			}
		});
		Ok(())
	}
}

impl Default for Observable {
	fn default() -> Self {
		Self::new()
	}
}

impl Emits for Observable {
	fn emitter(&self) -> &Emitter {
		&self.inner.emitter
	}
}

impl PartialEq for Observable {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Observable {}

impl std::fmt::Debug for Observable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Observable").field(&self.emitter().id()).finish()
	}
}
