//! Explicit identity for lock owners.
//!
//! Coordinators key their per-thread bookkeeping by [`OwnerId`] instead of
//! hiding it in thread-local storage, so every coordinator instance keeps its
//! own table and entries can be removed as soon as a thread stops holding
//! anything.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

thread_local! {
	static CURRENT_OWNER: OwnerId = OwnerId::allocate();
}

/// Process-unique identifier of a thread acting as a lock owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(NonZeroU64);

impl OwnerId {
	/// Returns the identifier of the calling thread, allocating it on first use.
	pub fn current() -> Self {
		CURRENT_OWNER.with(|id| *id)
	}

	fn allocate() -> Self {
		Self(NonZeroU64::MIN.saturating_add(NEXT_OWNER.fetch_add(1, Ordering::Relaxed)))
	}

	/// Raw numeric value; never zero.
	pub const fn get(self) -> u64 {
		self.0.get()
	}
}

impl fmt::Display for OwnerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "owner#{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn current_is_stable_within_a_thread() {
		assert_eq!(OwnerId::current(), OwnerId::current());
	}

	#[test]
	fn threads_get_distinct_ids() {
		let here = OwnerId::current();
		let there = std::thread::spawn(OwnerId::current).join().unwrap();
		assert_ne!(here, there);
		assert_ne!(there.get(), 0);
	}
}
