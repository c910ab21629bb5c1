//! Listener priorities.

/// Dispatch priority of a listener.
///
/// Higher values run first. Five named levels cover the usual cases; any
/// numeric value between or beyond them is accepted via [`Priority::of`].
/// Listeners with equal priority run in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(i32);

impl Priority {
	pub const HIGHEST: Priority = Priority(100_000);
	pub const HIGH: Priority = Priority(1_000);
	pub const NORMAL: Priority = Priority(0);
	pub const LOW: Priority = Priority(-1_000);
	pub const LOWEST: Priority = Priority(-100_000);

	/// A custom numeric priority.
	#[inline]
	pub const fn of(value: i32) -> Self {
		Priority(value)
	}

	/// The raw numeric value.
	#[inline]
	pub const fn value(self) -> i32 {
		self.0
	}
}

impl Default for Priority {
	fn default() -> Self {
		Priority::NORMAL
	}
}

impl From<i32> for Priority {
	fn from(value: i32) -> Self {
		Priority(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn named_levels_order() {
		assert!(Priority::HIGHEST > Priority::HIGH);
		assert!(Priority::HIGH > Priority::NORMAL);
		assert!(Priority::NORMAL > Priority::LOW);
		assert!(Priority::LOW > Priority::LOWEST);
	}

	#[test]
	fn numeric_between_levels() {
		let between = Priority::of(500);
		assert!(between > Priority::NORMAL);
		assert!(between < Priority::HIGH);
		assert!(Priority::of(200_000) > Priority::HIGHEST);
	}
}
