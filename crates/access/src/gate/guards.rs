//! Thread-assertion guards.
//!
//! Precondition checks for code that touches the protected model. A failed
//! check is a programming error and panics at the caller's location.

use super::AccessGate;

impl AccessGate {
	/// Panics unless the calling thread holds read or write access.
	#[track_caller]
	pub fn assert_read_access_allowed(&self) {
		assert!(
			self.is_read_access_allowed(),
			"Read access is allowed from inside read-action or write-action only (see AccessGate::read_sync)"
		);
	}

	/// Panics unless the calling thread holds write access.
	#[track_caller]
	pub fn assert_write_access_allowed(&self) {
		assert!(
			self.is_write_access_allowed(),
			"Write access is allowed inside write-action only (see AccessGate::write_async)"
		);
	}

	/// Panics unless called on the write serializer's thread.
	#[track_caller]
	pub fn assert_is_writer_thread(&self) {
		assert!(
			self.is_writer_thread(),
			"Access is allowed from the writer thread only (current thread: {:?})",
			std::thread::current().name()
		);
	}
}
