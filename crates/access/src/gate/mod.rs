//! The access gate: read and write actions over a [`LockCoordinator`].
//!
//! # Reads
//!
//! [`AccessGate::read_sync`] runs on the calling thread. If the thread can
//! already read (it holds read or write access) the computation runs inline,
//! otherwise shared access is acquired for its duration and released on every
//! exit path, unwinding included.
//!
//! # Writes
//!
//! [`AccessGate::write_async`] queues the computation on the write serializer
//! and returns a [`WriteFuture`]. When the caller already is the writer it runs
//! inline and the future is ready immediately.
//!
//! [`AccessGate::run_write_action_unsafe`] runs a write action on the calling
//! thread, bypassing the serializer. It is meant for nested writes from inside
//! a running write action and for call sites that are known to be on the
//! writer thread; anything else competes with the serializer for the lock.
//!
//! Both paths wrap the body in the four-phase protocol described in
//! [`crate::listeners`].
//!
//! # Deadlock hazard
//!
//! Read access cannot be upgraded. Requesting a write action while holding
//! only read access panics, and waiting on a [`WriteFuture`] while holding read
//! access never completes.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use xeno_worker::panic_message;

use crate::config::AccessConfig;
use crate::coordinator::{CoordinatorKind, LockCoordinator};
use crate::error::{AccessError, WriteError};
use crate::future::{WriteFuture, WriteOutcome};
use crate::listeners::{ListenerId, WriteActionListener, WriteActionListeners, WriteActionRecord};
use crate::serializer::WriteSerializer;

mod dispatch;
mod guards;
mod scope;

pub use dispatch::ReadDispatcher;
pub use scope::ReadAccessToken;
use scope::WriteActionScope;

struct GateInner {
	coordinator: Arc<dyn LockCoordinator>,
	listeners: WriteActionListeners,
	/// Write actions currently running on the lock holder, innermost last.
	actions: Mutex<Vec<WriteActionRecord>>,
	next_action_id: AtomicU64,
	/// Threads between `before_write_action_start` and acquiring the lock.
	pending_writes: AtomicUsize,
	slow_write_threshold: Option<Duration>,
	writer: WriteSerializer,
}

/// Cloneable handle to one access-controlled model.
///
/// Construct one per owning application context and pass it to whatever needs
/// it; independent gates share nothing. The writer thread stops once the last
/// handle is dropped, after draining queued writes.
#[derive(Clone)]
pub struct AccessGate {
	inner: Arc<GateInner>,
}

impl fmt::Debug for AccessGate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccessGate")
			.field("coordinator", &self.inner.coordinator)
			.field("writer", &self.inner.writer.thread_name())
			.field("listeners", &self.inner.listeners.len())
			.finish()
	}
}

impl AccessGate {
	/// Builds a gate with the coordinator selected by `config`.
	pub fn new(config: AccessConfig) -> Result<Self, AccessError> {
		Self::with_coordinator(config.coordinator.build(), &config)
	}

	/// Builds a gate around an existing coordinator.
	pub fn with_coordinator(coordinator: Arc<dyn LockCoordinator>, config: &AccessConfig) -> Result<Self, AccessError> {
		let writer = WriteSerializer::spawn(config.writer_thread_name.clone())?;
		tracing::debug!(coordinator = coordinator.kind().as_str(), writer = writer.thread_name(), "access.gate.created");
		Ok(Self {
			inner: Arc::new(GateInner {
				coordinator,
				listeners: WriteActionListeners::new(),
				actions: Mutex::new(Vec::new()),
				next_action_id: AtomicU64::new(1),
				pending_writes: AtomicUsize::new(0),
				slow_write_threshold: config.slow_write_threshold(),
				writer,
			}),
		})
	}

	pub fn coordinator(&self) -> &dyn LockCoordinator {
		self.inner.coordinator.as_ref()
	}

	pub fn kind(&self) -> CoordinatorKind {
		self.inner.coordinator.kind()
	}

	/// Runs `compute` with read access held for its duration.
	pub fn read_sync<T>(&self, compute: impl FnOnce() -> T) -> T {
		let _token = self.acquire_read_token();
		compute()
	}

	/// Acquires read access until the returned token is dropped.
	///
	/// The token is empty when the calling thread could already read, so it is
	/// always safe to take one even inside a read or write action.
	pub fn acquire_read_token(&self) -> ReadAccessToken<'_> {
		if self.is_read_access_allowed() {
			return ReadAccessToken::empty();
		}
		self.inner.coordinator.read_lock();
		ReadAccessToken::held(self.inner.coordinator.as_ref())
	}

	/// Runs `action` under read access only if it is available without
	/// waiting. Returns whether the action ran.
	pub fn try_read_sync(&self, action: impl FnOnce()) -> bool {
		if self.is_read_access_allowed() {
			action();
			return true;
		}
		if !self.inner.coordinator.try_read_lock() {
			tracing::trace!("access.read.try_failed");
			return false;
		}
		let _token = ReadAccessToken::held(self.inner.coordinator.as_ref());
		action();
		true
	}

	/// Runs `compute` as a write action on the calling thread.
	///
	/// Blocks until write access is acquired unless the thread already holds
	/// it, in which case the action nests inside the running one.
	///
	/// # Panics
	///
	/// Panics if the calling thread holds read access but not write access.
	pub fn run_write_action_unsafe<T, F>(&self, compute: F) -> T
	where
		F: FnOnce() -> T,
	{
		self.run_write_action_labeled(type_name::<F>(), compute)
	}

	/// [`Self::run_write_action_unsafe`] with an explicit label for listeners
	/// and [`Self::has_write_action`].
	pub fn run_write_action_labeled<T>(&self, label: impl Into<Cow<'static, str>>, compute: impl FnOnce() -> T) -> T {
		let _scope = WriteActionScope::begin(&self.inner, label.into());
		compute()
	}

	/// Schedules `compute` as a write action on the writer thread.
	///
	/// Runs inline when the caller already is the writer. Errors returned by
	/// `compute` resolve the future as [`WriteError::Action`]; panics resolve it
	/// as [`WriteError::Panicked`] after the lock and notifications unwound.
	pub fn write_async<T, E, F>(&self, compute: F) -> WriteFuture<T, E>
	where
		F: FnOnce() -> Result<T, E> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		self.write_async_labeled(type_name::<F>(), compute)
	}

	/// [`Self::write_async`] with an explicit label.
	pub fn write_async_labeled<T, E, F>(&self, label: impl Into<Cow<'static, str>>, compute: F) -> WriteFuture<T, E>
	where
		F: FnOnce() -> Result<T, E> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let label = label.into();
		if self.is_writer_thread() || self.is_write_access_allowed() {
			return WriteFuture::ready(self.run_write_catching(label, compute));
		}

		let (tx, rx) = oneshot::channel();
		let gate = self.clone();
		tracing::trace!(action = %label, pending = self.inner.writer.pending(), "access.write.submit");
		let submitted = self.inner.writer.submit(move || {
			let outcome = gate.run_write_catching(label, compute);
			if tx.send(outcome).is_err() {
				tracing::trace!("access.write.result_dropped");
			}
		});
		match submitted {
			Ok(()) => WriteFuture::pending(rx),
			Err(_) => WriteFuture::ready(Err(WriteError::WriterStopped)),
		}
	}

	fn run_write_catching<T, E>(&self, label: Cow<'static, str>, compute: impl FnOnce() -> Result<T, E>) -> WriteOutcome<T, E> {
		match catch_unwind(AssertUnwindSafe(|| self.run_write_action_labeled(label, compute))) {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => Err(WriteError::Action(err)),
			Err(payload) => Err(WriteError::Panicked(panic_message(payload.as_ref()))),
		}
	}

	/// True if the calling thread holds read or write access.
	pub fn is_read_access_allowed(&self) -> bool {
		let coordinator = &self.inner.coordinator;
		coordinator.is_write_locked_by_current_thread() || coordinator.is_read_locked_by_current_thread()
	}

	/// True if the calling thread holds write access.
	pub fn is_write_access_allowed(&self) -> bool {
		self.inner.coordinator.is_write_locked_by_current_thread()
	}

	/// True if any thread holds write access. For diagnostics only; the answer
	/// may be stale by the time it is read.
	pub fn is_write_action_in_progress(&self) -> bool {
		self.inner.coordinator.is_write_locked()
	}

	/// True while some thread has announced a write action but not yet
	/// acquired the lock.
	pub fn is_write_action_pending(&self) -> bool {
		self.inner.pending_writes.load(Ordering::Acquire) > 0
	}

	/// True when called on the write serializer's thread.
	pub fn is_writer_thread(&self) -> bool {
		self.inner.writer.is_writer_thread()
	}

	/// Write actions queued on the serializer and not yet started.
	pub fn queued_write_actions(&self) -> usize {
		self.inner.writer.pending()
	}

	/// Innermost write action currently running, if any.
	pub fn current_write_action(&self) -> Option<WriteActionRecord> {
		self.inner.actions.lock().last().cloned()
	}

	/// True if a write action with `label` is running, at any nesting level.
	///
	/// # Panics
	///
	/// Panics if the calling thread has no read access.
	#[track_caller]
	pub fn has_write_action(&self, label: &str) -> bool {
		self.assert_read_access_allowed();
		self.inner.actions.lock().iter().rev().any(|action| action.label() == label)
	}

	/// Registers a listener for write-action lifecycle events.
	pub fn add_write_action_listener(&self, listener: Arc<dyn WriteActionListener>) -> ListenerId {
		self.inner.listeners.add(listener)
	}

	pub fn remove_write_action_listener(&self, id: ListenerId) -> bool {
		self.inner.listeners.remove(id)
	}

	/// A dispatcher running reads on whichever thread calls it.
	pub fn read_dispatcher(&self) -> ReadDispatcher {
		ReadDispatcher::new(self.clone())
	}

	/// Stops the writer thread after the queued write actions have run.
	/// Later [`Self::write_async`] calls resolve to [`WriteError::WriterStopped`]
	/// unless they run inline.
	pub fn shutdown(&self) {
		self.inner.writer.shutdown();
	}
}

impl GateInner {
	fn next_record(&self, label: Cow<'static, str>) -> WriteActionRecord {
		let depth = if self.coordinator.is_write_locked_by_current_thread() {
			self.actions.lock().len()
		} else {
			0
		};
		WriteActionRecord::new(self.next_action_id.fetch_add(1, Ordering::Relaxed), label, depth)
	}

	fn acquire_write(&self, action: &WriteActionRecord) {
		let started = Instant::now();
		self.coordinator.write_lock();
		let waited = started.elapsed();
		match self.slow_write_threshold {
			Some(threshold) if waited >= threshold => tracing::warn!(
				action = action.label(),
				waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
				"access.write.slow_acquire"
			),
			_ => tracing::debug!(action = action.label(), waited_us = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX), "access.write.acquired"),
		}
	}
}
