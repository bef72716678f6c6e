//! Write-action lifecycle notifications.
//!
//! Every write action fires four events, in order:
//!
//! 1. [`before_write_action_start`](WriteActionListener::before_write_action_start), before the write lock is requested;
//! 2. [`write_action_started`](WriteActionListener::write_action_started), with the lock held, before the body runs;
//! 3. [`write_action_finished`](WriteActionListener::write_action_finished), with the lock held, after the body returned or panicked;
//! 4. [`after_write_action_finished`](WriteActionListener::after_write_action_finished), after the lock was released.
//!
//! Nested write actions fire the first three events with the lock held by the
//! enclosing action. Only the outermost action acquires and releases the lock,
//! so only it fires `after_write_action_finished`.
//!
//! Listeners observe; they cannot veto. A panicking listener is logged and
//! skipped so it cannot prevent the lock from being released or other
//! listeners from running.

use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use xeno_worker::panic_message;

/// Handle identifying the write action an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteActionRecord {
	id: u64,
	label: Cow<'static, str>,
	depth: usize,
}

impl WriteActionRecord {
	pub(crate) fn new(id: u64, label: Cow<'static, str>, depth: usize) -> Self {
		Self { id, label, depth }
	}

	/// Identifier unique within one gate; increases with every write action.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Caller-supplied label, or the computation's type name.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Number of enclosing write actions on the same thread.
	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn is_nested(&self) -> bool {
		self.depth > 0
	}
}

/// Observer of write-action boundaries. All methods default to no-ops.
pub trait WriteActionListener: Send + Sync {
	/// The write lock has not been requested yet and may be held by someone else.
	fn before_write_action_start(&self, _action: &WriteActionRecord) {}

	/// The write lock is held and the body is about to run.
	fn write_action_started(&self, _action: &WriteActionRecord) {}

	/// The body completed, successfully or not. The write lock is still held.
	fn write_action_finished(&self, _action: &WriteActionRecord) {}

	/// The outermost write action is over and the write lock has been released.
	/// Not fired for nested actions.
	fn after_write_action_finished(&self, _action: &WriteActionRecord) {}
}

/// One of the four notification points of a write action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteActionPhase {
	BeforeStart,
	Started,
	Finished,
	AfterFinished,
}

impl WriteActionPhase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BeforeStart => "before_start",
			Self::Started => "started",
			Self::Finished => "finished",
			Self::AfterFinished => "after_finished",
		}
	}

	fn dispatch(self, listener: &dyn WriteActionListener, action: &WriteActionRecord) {
		match self {
			Self::BeforeStart => listener.before_write_action_start(action),
			Self::Started => listener.write_action_started(action),
			Self::Finished => listener.write_action_finished(action),
			Self::AfterFinished => listener.after_write_action_finished(action),
		}
	}
}

/// Registration handle returned by [`WriteActionListeners::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered set of [`WriteActionListener`]s.
///
/// Listeners are notified in registration order. Each broadcast iterates over
/// a snapshot, so listeners may register or unregister from inside a callback;
/// the change takes effect from the next event.
#[derive(Default)]
pub struct WriteActionListeners {
	next_id: AtomicU64,
	entries: RwLock<Vec<(ListenerId, Arc<dyn WriteActionListener>)>>,
}

impl std::fmt::Debug for WriteActionListeners {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WriteActionListeners").field("len", &self.len()).finish()
	}
}

impl WriteActionListeners {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a listener.
	pub fn add(&self, listener: Arc<dyn WriteActionListener>) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.entries.write().push((id, listener));
		id
	}

	/// Removes a listener. Returns `false` if it was not registered.
	pub fn remove(&self, id: ListenerId) -> bool {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|(entry, _)| *entry != id);
		entries.len() != before
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Notifies every listener of `phase`.
	pub fn fire(&self, phase: WriteActionPhase, action: &WriteActionRecord) {
		let snapshot: Vec<_> = self.entries.read().iter().map(|(id, listener)| (*id, Arc::clone(listener))).collect();
		tracing::trace!(phase = phase.as_str(), action = action.label(), id = action.id(), listeners = snapshot.len(), "access.listeners.fire");

		for (id, listener) in snapshot {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| phase.dispatch(listener.as_ref(), action))) {
				tracing::error!(
					phase = phase.as_str(),
					listener = id.0,
					action = action.label(),
					panic = %panic_message(payload.as_ref()),
					"access.listeners.panicked"
				);
			}
		}
	}
}

#[cfg(test)]
mod tests;
