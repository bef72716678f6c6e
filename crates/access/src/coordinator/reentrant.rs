use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::lock_api::{RawRwLock as _, RawRwLockDowngrade as _, RawRwLockFair as _, RawRwLockTimed as _};
use parking_lot::{Mutex, RawRwLock};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::{CoordinatorKind, LockCoordinator};
use crate::error::LockError;
use crate::owner::OwnerId;

/// Slice between cancellation checks while waiting interruptibly.
const INTERRUPT_POLL: Duration = Duration::from_millis(10);

/// Read holds of one thread.
#[derive(Debug, Default, Clone, Copy)]
struct ReadHolds {
	/// Acquisitions backed by the thread's own shared hold on the primitive.
	shared: usize,
	/// Acquisitions taken while the thread owned exclusive mode.
	under_write: usize,
}

/// Fair reader/writer coordinator with per-thread reentrancy.
///
/// The primitive's shared mode is held at most once per thread: it is taken
/// when a thread's read count goes from zero to one and released when it
/// returns to zero, so nested reads never queue behind a waiting writer.
/// Exclusive mode tracks its owner and nesting depth. Reads taken by the
/// writer are counted apart from ordinary reads; if any are still held when
/// the outermost write is released, the exclusive hold is downgraded to a
/// shared one instead of being dropped.
pub struct ReentrantCoordinator {
	raw: RawRwLock,
	/// [`OwnerId`] of the exclusive holder, `0` when free.
	owner: AtomicU64,
	write_depth: AtomicUsize,
	reads: Mutex<FxHashMap<OwnerId, ReadHolds>>,
}

impl Default for ReentrantCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ReentrantCoordinator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReentrantCoordinator")
			.field("owner", &self.owner.load(Ordering::Relaxed))
			.field("write_depth", &self.write_depth.load(Ordering::Relaxed))
			.field("readers", &self.reads.lock().len())
			.finish()
	}
}

impl ReentrantCoordinator {
	pub fn new() -> Self {
		Self {
			raw: RawRwLock::INIT,
			owner: AtomicU64::new(0),
			write_depth: AtomicUsize::new(0),
			reads: Mutex::new(FxHashMap::default()),
		}
	}

	/// Read acquisitions the calling thread currently holds, including those
	/// taken while it owned the write lock.
	pub fn read_hold_count(&self) -> usize {
		self.reads
			.lock()
			.get(&OwnerId::current())
			.map_or(0, |holds| holds.shared + holds.under_write)
	}

	/// Nesting depth of the calling thread's write hold, `0` if it has none.
	pub fn write_hold_count(&self) -> usize {
		if self.owns_write(OwnerId::current()) {
			self.write_depth.load(Ordering::Relaxed)
		} else {
			0
		}
	}

	fn owns_write(&self, me: OwnerId) -> bool {
		self.owner.load(Ordering::Acquire) == me.get()
	}

	fn shared_holds(&self, me: OwnerId) -> usize {
		self.reads.lock().get(&me).map_or(0, |holds| holds.shared)
	}

	fn acquire_read(&self, acquire: impl FnOnce() -> Result<bool, LockError>) -> Result<bool, LockError> {
		let me = OwnerId::current();
		if self.owns_write(me) {
			self.reads.lock().entry(me).or_default().under_write += 1;
			return Ok(true);
		}

		{
			let mut reads = self.reads.lock();
			if let Some(holds) = reads.get_mut(&me)
				&& holds.shared > 0
			{
				holds.shared += 1;
				return Ok(true);
			}
		}

		// Only this thread touches its own entry, so the map lock need not be
		// held while blocking on the primitive.
		if !acquire()? {
			return Ok(false);
		}
		self.reads.lock().entry(me).or_default().shared += 1;
		tracing::trace!(owner = %me, "access.reentrant.read_acquired");
		Ok(true)
	}

	fn acquire_write(&self, acquire: impl FnOnce() -> Result<bool, LockError>) -> Result<bool, LockError> {
		let me = OwnerId::current();
		if self.owns_write(me) {
			self.write_depth.fetch_add(1, Ordering::Relaxed);
			return Ok(true);
		}
		assert!(
			self.shared_holds(me) == 0,
			"read-to-write upgrade is not supported: release read access before acquiring write access"
		);

		if !acquire()? {
			return Ok(false);
		}
		self.owner.store(me.get(), Ordering::Release);
		self.write_depth.store(1, Ordering::Relaxed);
		tracing::trace!(owner = %me, "access.reentrant.write_acquired");
		Ok(true)
	}
}

fn poll_until_cancelled(cancel: &CancellationToken, mut attempt: impl FnMut(Duration) -> bool) -> Result<bool, LockError> {
	loop {
		if cancel.is_cancelled() {
			return Err(LockError::Interrupted);
		}
		if attempt(INTERRUPT_POLL) {
			return Ok(true);
		}
	}
}

impl LockCoordinator for ReentrantCoordinator {
	fn kind(&self) -> CoordinatorKind {
		CoordinatorKind::Reentrant
	}

	fn read_lock(&self) {
		let _ = self.acquire_read(|| {
			self.raw.lock_shared();
			Ok(true)
		});
	}

	fn try_read_lock(&self) -> bool {
		matches!(self.acquire_read(|| Ok(self.raw.try_lock_shared())), Ok(true))
	}

	fn try_read_lock_for(&self, timeout: Duration) -> Result<bool, LockError> {
		self.acquire_read(|| Ok(self.raw.try_lock_shared_for(timeout)))
	}

	fn read_lock_interruptibly(&self, cancel: &CancellationToken) -> Result<(), LockError> {
		self.acquire_read(|| poll_until_cancelled(cancel, |slice| self.raw.try_lock_shared_for(slice)))
			.map(drop)
	}

	fn read_unlock(&self) {
		let me = OwnerId::current();
		let release_shared = {
			let mut reads = self.reads.lock();
			let Some(holds) = reads.get_mut(&me) else {
				tracing::warn!(owner = %me, "access.reentrant.unbalanced_read_unlock");
				return;
			};
			let release = if holds.under_write > 0 {
				holds.under_write -= 1;
				false
			} else {
				holds.shared -= 1;
				holds.shared == 0
			};
			if holds.shared == 0 && holds.under_write == 0 {
				reads.remove(&me);
			}
			release
		};

		if release_shared {
			// SAFETY: the calling thread's shared count just dropped to zero,
			// so it holds exactly one shared acquisition of the primitive.
			unsafe { self.raw.unlock_shared_fair() };
			tracing::trace!(owner = %me, "access.reentrant.read_released");
		}
	}

	fn write_lock(&self) {
		let _ = self.acquire_write(|| {
			self.raw.lock_exclusive();
			Ok(true)
		});
	}

	fn try_write_lock(&self) -> bool {
		matches!(self.acquire_write(|| Ok(self.raw.try_lock_exclusive())), Ok(true))
	}

	fn try_write_lock_for(&self, timeout: Duration) -> Result<bool, LockError> {
		self.acquire_write(|| Ok(self.raw.try_lock_exclusive_for(timeout)))
	}

	fn write_lock_interruptibly(&self, cancel: &CancellationToken) -> Result<(), LockError> {
		self.acquire_write(|| poll_until_cancelled(cancel, |slice| self.raw.try_lock_exclusive_for(slice)))
			.map(drop)
	}

	fn write_unlock(&self) {
		let me = OwnerId::current();
		if !self.owns_write(me) {
			tracing::warn!(owner = %me, "access.reentrant.unbalanced_write_unlock");
			return;
		}
		if self.write_depth.fetch_sub(1, Ordering::Relaxed) > 1 {
			return;
		}

		let downgrade = {
			let mut reads = self.reads.lock();
			match reads.get_mut(&me) {
				Some(holds) if holds.under_write > 0 => {
					holds.shared += holds.under_write;
					holds.under_write = 0;
					true
				}
				_ => false,
			}
		};

		self.owner.store(0, Ordering::Release);
		// SAFETY: `owns_write` proved the calling thread acquired exclusive
		// mode, and the depth just reached zero so this is its last release.
		unsafe {
			if downgrade {
				self.raw.downgrade();
			} else {
				self.raw.unlock_exclusive_fair();
			}
		}
		tracing::trace!(owner = %me, downgraded = downgrade, "access.reentrant.write_released");
	}

	fn is_read_locked_by_current_thread(&self) -> bool {
		self.shared_holds(OwnerId::current()) > 0
	}

	fn is_write_locked_by_current_thread(&self) -> bool {
		self.owns_write(OwnerId::current())
	}

	fn is_write_locked(&self) -> bool {
		self.owner.load(Ordering::Acquire) != 0
	}
}

#[cfg(test)]
mod tests;
