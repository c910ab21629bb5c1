use thiserror::Error;

/// Failures raised by collection mutation and binding.
#[derive(Debug, Error)]
pub enum CollectionError {
	/// Items must be JSON objects so an id field can live on them.
	#[error("collection items must be objects, got `{0}`")]
	InvalidItem(&'static str),

	/// The id field was present but not a string.
	#[error("item id under `{key}` must be a string, got `{found}`")]
	InvalidId { key: Box<str>, found: &'static str },

	/// An item with this id already exists in the collection.
	#[error("item id `{0}` already present")]
	DuplicateId(Box<str>),

	/// Insertion index past the end of the collection.
	#[error("index {index} out of range for collection of length {len}")]
	IndexOutOfRange { index: usize, len: usize },

	/// Lookup by id or index found nothing to remove.
	#[error("no item at `{0}`")]
	NotFound(Box<str>),

	/// A collection can synchronize from at most one source at a time.
	#[error("collection is already bound; call `clear` first to sever the binding")]
	AlreadyBound,
}
