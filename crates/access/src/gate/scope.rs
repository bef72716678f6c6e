use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use super::GateInner;
use crate::coordinator::LockCoordinator;
use crate::listeners::{WriteActionPhase, WriteActionRecord};

/// Read access held until drop.
///
/// Must be dropped on the thread that acquired it.
#[must_use = "read access is released as soon as the token is dropped"]
pub struct ReadAccessToken<'a> {
	coordinator: Option<&'a dyn LockCoordinator>,
	_not_send: PhantomData<*const ()>,
}

impl<'a> ReadAccessToken<'a> {
	pub(super) fn empty() -> Self {
		Self {
			coordinator: None,
			_not_send: PhantomData,
		}
	}

	pub(super) fn held(coordinator: &'a dyn LockCoordinator) -> Self {
		Self {
			coordinator: Some(coordinator),
			_not_send: PhantomData,
		}
	}

	/// True if the token did not acquire anything because the thread could
	/// already read.
	pub fn is_empty(&self) -> bool {
		self.coordinator.is_none()
	}
}

impl Drop for ReadAccessToken<'_> {
	fn drop(&mut self) {
		if let Some(coordinator) = self.coordinator {
			coordinator.read_unlock();
		}
	}
}

/// One running write action.
///
/// Construction fires `before_write_action_start`, acquires the write lock
/// unless this thread already holds it, pushes the action and fires
/// `write_action_started`. Dropping fires `write_action_finished`, pops the
/// action and, if this scope acquired the lock, releases it and fires
/// `after_write_action_finished`. Drop runs on unwind too.
pub(super) struct WriteActionScope<'a> {
	gate: &'a GateInner,
	record: WriteActionRecord,
	acquired: bool,
	_not_send: PhantomData<*const ()>,
}

impl<'a> WriteActionScope<'a> {
	#[track_caller]
	pub(super) fn begin(gate: &'a GateInner, label: Cow<'static, str>) -> Self {
		let nested = gate.coordinator.is_write_locked_by_current_thread();
		assert!(
			nested || !gate.coordinator.is_read_locked_by_current_thread(),
			"cannot start a write action while holding read access: read-to-write upgrade is not supported"
		);

		let record = gate.next_record(label);
		gate.pending_writes.fetch_add(1, Ordering::AcqRel);
		gate.listeners.fire(WriteActionPhase::BeforeStart, &record);
		if !nested {
			gate.acquire_write(&record);
		}
		gate.pending_writes.fetch_sub(1, Ordering::AcqRel);

		gate.actions.lock().push(record.clone());
		tracing::trace!(action = record.label(), id = record.id(), depth = record.depth(), "access.write.start");
		gate.listeners.fire(WriteActionPhase::Started, &record);

		Self {
			gate,
			record,
			acquired: !nested,
			_not_send: PhantomData,
		}
	}
}

impl Drop for WriteActionScope<'_> {
	fn drop(&mut self) {
		let gate = self.gate;
		gate.listeners.fire(WriteActionPhase::Finished, &self.record);

		let popped = gate.actions.lock().pop();
		debug_assert_eq!(popped.as_ref().map(WriteActionRecord::id), Some(self.record.id()), "write action stack out of order");

		if self.acquired {
			gate.coordinator.write_unlock();
		}
		tracing::trace!(
			action = self.record.label(),
			id = self.record.id(),
			released = self.acquired,
			panicking = std::thread::panicking(),
			"access.write.end"
		);
		// Nested actions end with the lock still held by the enclosing one.
		if self.acquired {
			gate.listeners.fire(WriteActionPhase::AfterFinished, &self.record);
		}
	}
}
