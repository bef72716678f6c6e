//! Single-threaded FIFO executor.
//!
//! A [`SerialExecutor`] owns exactly one named OS thread that drains an
//! unbounded queue in submission order. Jobs never overlap, and a panicking
//! job is contained so the thread keeps serving the queue.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{TaskClass, panic_message, spawn_named_thread};

/// Boxed unit of work accepted by a [`SerialExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned when submitting to an executor that has been shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("serial executor has been shut down")]
pub struct ExecutorClosed;

/// Dedicated thread executing submitted jobs one at a time, in FIFO order.
#[derive(Debug)]
pub struct SerialExecutor {
	class: TaskClass,
	name: String,
	tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
	thread: Mutex<Option<JoinHandle<()>>>,
	thread_id: ThreadId,
	pending: Arc<AtomicUsize>,
}

impl SerialExecutor {
	/// Spawns the executor thread.
	pub fn spawn(class: TaskClass, name: impl Into<String>) -> std::io::Result<Self> {
		let name = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		let pending = Arc::new(AtomicUsize::new(0));

		let thread_pending = Arc::clone(&pending);
		let thread_name = name.clone();
		let handle = spawn_named_thread(class, name.clone(), move || {
			while let Some(job) = rx.blocking_recv() {
				thread_pending.fetch_sub(1, Ordering::AcqRel);
				if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
					tracing::error!(
						worker_class = class.as_str(),
						thread = %thread_name,
						panic = %panic_message(payload.as_ref()),
						"worker.serial.job_panicked"
					);
				}
			}
			tracing::trace!(worker_class = class.as_str(), thread = %thread_name, "worker.serial.stopped");
		})?;

		Ok(Self {
			class,
			name,
			tx: Mutex::new(Some(tx)),
			thread_id: handle.thread().id(),
			thread: Mutex::new(Some(handle)),
			pending,
		})
	}

	/// Returns the executor thread name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Enqueues a job behind everything already submitted.
	pub fn execute<F>(&self, job: F) -> Result<(), ExecutorClosed>
	where
		F: FnOnce() + Send + 'static,
	{
		let guard = self.tx.lock();
		let Some(tx) = guard.as_ref() else {
			return Err(ExecutorClosed);
		};
		self.pending.fetch_add(1, Ordering::AcqRel);
		if tx.send(Box::new(job)).is_err() {
			self.pending.fetch_sub(1, Ordering::AcqRel);
			return Err(ExecutorClosed);
		}
		tracing::trace!(worker_class = self.class.as_str(), pending = self.pending(), "worker.serial.submit");
		Ok(())
	}

	/// Returns `true` when called from the executor thread itself.
	pub fn is_current(&self) -> bool {
		std::thread::current().id() == self.thread_id
	}

	/// Number of submitted jobs the thread has not started yet.
	pub fn pending(&self) -> usize {
		self.pending.load(Ordering::Acquire)
	}

	/// Returns `true` once [`Self::shutdown`] has run.
	pub fn is_shut_down(&self) -> bool {
		self.tx.lock().is_none()
	}

	/// Closes the queue and waits for already submitted jobs to finish.
	///
	/// When invoked from the executor thread the join is skipped; the thread
	/// exits on its own after the current job returns.
	pub fn shutdown(&self) {
		drop(self.tx.lock().take());
		if self.is_current() {
			return;
		}
		let handle = self.thread.lock().take();
		if let Some(handle) = handle
			&& handle.join().is_err()
		{
			tracing::warn!(thread = %self.name, "worker.serial.join_failed");
		}
	}
}

impl Drop for SerialExecutor {
	fn drop(&mut self) {
		self.shutdown();
	}
}
