//! Lock coordinators: the mutual-exclusion engines behind the access gate.
//!
//! Two strategies share the [`LockCoordinator`] contract:
//!
//! * [`ReentrantCoordinator`] wraps a fair reader/writer lock and counts
//!   per-thread read holds; the write side is natively reentrant and supports
//!   timed and cancellable waits.
//! * [`StampedCoordinator`] wraps a [`StampedLock`](crate::StampedLock) and
//!   remembers the stamp each thread was issued. It is not reentrant on its
//!   own and rejects timed and cancellable waits.
//!
//! # Upgrades
//!
//! Neither variant upgrades a read hold to a write hold. A thread that holds
//! only read access and asks for write access would wait for itself forever,
//! so both coordinators panic instead. Release every read hold first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::LockError;

mod reentrant;
mod stamped;

pub use reentrant::ReentrantCoordinator;
pub use stamped::StampedCoordinator;

/// Selects a [`LockCoordinator`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorKind {
	/// Fair reader/writer lock with per-thread reentrancy counting.
	#[default]
	Reentrant,
	/// Stamp-issuing lock with per-thread stamp slots.
	Stamped,
}

impl CoordinatorKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Reentrant => "reentrant",
			Self::Stamped => "stamped",
		}
	}

	/// Builds a fresh coordinator of this kind.
	pub fn build(self) -> Arc<dyn LockCoordinator> {
		match self {
			Self::Reentrant => Arc::new(ReentrantCoordinator::new()),
			Self::Stamped => Arc::new(StampedCoordinator::new()),
		}
	}
}

impl fmt::Display for CoordinatorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Shared/exclusive lock with ownership queries for the calling thread.
///
/// Every acquisition must be paired with a release on the same thread.
/// Releasing without a matching hold is a logged no-op.
pub trait LockCoordinator: Send + Sync + fmt::Debug {
	fn kind(&self) -> CoordinatorKind;

	/// Blocks until shared access is held by the calling thread.
	fn read_lock(&self);

	/// Takes shared access only if no waiting is needed.
	fn try_read_lock(&self) -> bool;

	/// Waits at most `timeout` for shared access.
	fn try_read_lock_for(&self, timeout: Duration) -> Result<bool, LockError>;

	/// Waits for shared access until `cancel` fires.
	fn read_lock_interruptibly(&self, cancel: &CancellationToken) -> Result<(), LockError>;

	fn read_unlock(&self);

	/// Blocks until exclusive access is held by the calling thread.
	///
	/// # Panics
	///
	/// Panics if the calling thread holds read access without write access.
	fn write_lock(&self);

	fn try_write_lock(&self) -> bool;

	/// Waits at most `timeout` for exclusive access.
	fn try_write_lock_for(&self, timeout: Duration) -> Result<bool, LockError>;

	/// Waits for exclusive access until `cancel` fires.
	fn write_lock_interruptibly(&self, cancel: &CancellationToken) -> Result<(), LockError>;

	fn write_unlock(&self);

	/// True if the calling thread holds a read acquisition of its own.
	fn is_read_locked_by_current_thread(&self) -> bool;

	/// True if the calling thread holds exclusive access.
	fn is_write_locked_by_current_thread(&self) -> bool;

	/// True if any thread holds exclusive access.
	fn is_write_locked(&self) -> bool;
}
