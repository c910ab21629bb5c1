use thiserror::Error;

/// Errors raised by misuse of the observable API.
///
/// All variants are programmer errors raised synchronously at the call site;
/// nothing is retried or recovered internally.
#[derive(Error, Debug, Clone)]
pub enum ObservableError {
	/// `set` was called with a name already taken by a defined method.
	#[error("property `{0}` collides with a defined method")]
	PropertyCollidesWithMethod(Box<str>),
	/// `define_method` was called with a name already taken by a property.
	#[error("method `{0}` collides with a reactive property")]
	MethodCollidesWithProperty(Box<str>),
	/// `define_method` was called twice for the same name.
	#[error("method `{0}` is already defined")]
	MethodAlreadyDefined(Box<str>),
	/// `bind` was called with no properties.
	#[error("bind() requires at least one property")]
	BindWithoutProperties,
	/// The same property appeared twice in one `bind` call.
	#[error("duplicate property `{0}` in bind()")]
	DuplicateBindProperty(Box<str>),
	/// A property may be the target of at most one active binding.
	#[error("property `{0}` is already bound")]
	PropertyAlreadyBound(Box<str>),
	/// Positional binding with a different number of source properties.
	#[error("bound {bound} properties but got {sources} source properties")]
	BindingCountMismatch { bound: usize, sources: usize },
	/// A transform callback is only valid for a single bound property.
	#[error("a transform callback requires exactly one bound property")]
	CallbackWithMultipleTargets,
	/// A computed binding needs at least one source pair.
	#[error("binding requires at least one source")]
	BindWithoutSources,
	/// `decorate` of a name with no defined method behind it.
	#[error("cannot decorate `{0}`: no such method")]
	DecorateUnknownMethod(Box<str>),
	/// `decorate` called twice would double-run the default listener.
	#[error("method `{0}` is already decorated")]
	MethodAlreadyDecorated(Box<str>),
	/// `invoke` of an unknown method name.
	#[error("no method named `{0}`")]
	UnknownMethod(Box<str>),
}
