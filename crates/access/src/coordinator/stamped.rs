use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::{CoordinatorKind, LockCoordinator};
use crate::error::LockError;
use crate::owner::OwnerId;
use crate::stamp::{Stamp, StampMode, StampedLock};

/// Coordinator over a [`StampedLock`] that remembers each thread's stamp.
///
/// One slot per owner: a thread holds at most one stamp at a time, so the
/// coordinator itself is not reentrant. The access gate supplies reentrancy by
/// not re-acquiring when the thread already has the access it needs.
#[derive(Debug, Default)]
pub struct StampedCoordinator {
	lock: StampedLock,
	slots: Mutex<FxHashMap<OwnerId, Stamp>>,
}

impl StampedCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	/// The underlying stamp lock, for optimistic reads.
	pub fn stamped_lock(&self) -> &StampedLock {
		&self.lock
	}

	/// Stamp currently stored for the calling thread.
	pub fn current_stamp(&self) -> Option<Stamp> {
		self.slots.lock().get(&OwnerId::current()).copied()
	}

	fn current_mode(&self) -> Option<StampMode> {
		self.current_stamp().map(Stamp::mode)
	}

	fn store(&self, stamp: Stamp) {
		let me = OwnerId::current();
		self.slots.lock().insert(me, stamp);
		tracing::trace!(owner = %me, mode = stamp.mode().as_str(), "access.stamped.acquired");
	}

	fn assert_slot_free(&self) {
		assert!(
			self.current_stamp().is_none(),
			"stamped coordinator is not reentrant: release the current stamp before acquiring again"
		);
	}

	/// Clears the calling thread's slot and releases its stamp. No-op when the
	/// slot is empty.
	fn release(&self) {
		let me = OwnerId::current();
		let Some(stamp) = self.slots.lock().remove(&me) else {
			tracing::trace!(owner = %me, "access.stamped.release_without_stamp");
			return;
		};
		match self.lock.unlock(stamp) {
			Ok(()) => tracing::trace!(owner = %me, mode = stamp.mode().as_str(), "access.stamped.released"),
			Err(err) => tracing::error!(owner = %me, %err, "access.stamped.release_rejected"),
		}
	}

	fn unsupported(&self, operation: &'static str) -> LockError {
		LockError::Unsupported {
			variant: CoordinatorKind::Stamped,
			operation,
		}
	}
}

impl LockCoordinator for StampedCoordinator {
	fn kind(&self) -> CoordinatorKind {
		CoordinatorKind::Stamped
	}

	fn read_lock(&self) {
		self.assert_slot_free();
		let stamp = self.lock.read_lock();
		self.store(stamp);
	}

	fn try_read_lock(&self) -> bool {
		self.assert_slot_free();
		match self.lock.try_read_lock() {
			Some(stamp) => {
				self.store(stamp);
				true
			}
			None => false,
		}
	}

	fn try_read_lock_for(&self, _timeout: Duration) -> Result<bool, LockError> {
		Err(self.unsupported("try_read_lock_for"))
	}

	fn read_lock_interruptibly(&self, _cancel: &CancellationToken) -> Result<(), LockError> {
		Err(self.unsupported("read_lock_interruptibly"))
	}

	fn read_unlock(&self) {
		self.release();
	}

	fn write_lock(&self) {
		assert!(
			self.current_mode() != Some(StampMode::Read),
			"read-to-write upgrade is not supported: release read access before acquiring write access"
		);
		self.assert_slot_free();
		let stamp = self.lock.write_lock();
		self.store(stamp);
	}

	fn try_write_lock(&self) -> bool {
		self.assert_slot_free();
		match self.lock.try_write_lock() {
			Some(stamp) => {
				self.store(stamp);
				true
			}
			None => false,
		}
	}

	fn try_write_lock_for(&self, _timeout: Duration) -> Result<bool, LockError> {
		Err(self.unsupported("try_write_lock_for"))
	}

	fn write_lock_interruptibly(&self, _cancel: &CancellationToken) -> Result<(), LockError> {
		Err(self.unsupported("write_lock_interruptibly"))
	}

	fn write_unlock(&self) {
		self.release();
	}

	fn is_read_locked_by_current_thread(&self) -> bool {
		self.current_mode() == Some(StampMode::Read)
	}

	fn is_write_locked_by_current_thread(&self) -> bool {
		self.current_mode() == Some(StampMode::Write)
	}

	fn is_write_locked(&self) -> bool {
		self.lock.is_write_locked()
	}
}

#[cfg(test)]
mod tests;
