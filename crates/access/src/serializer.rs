//! The single writer context.
//!
//! All asynchronous write actions funnel through one [`SerialExecutor`]
//! thread, so they run one after another in the order they were queued.
//! Ordering between callers that submit concurrently is decided by whoever
//! reaches the queue first.

use xeno_worker::{ExecutorClosed, SerialExecutor, TaskClass};

/// Dedicated thread that runs queued write actions.
#[derive(Debug)]
pub struct WriteSerializer {
	executor: SerialExecutor,
}

impl WriteSerializer {
	pub fn spawn(thread_name: impl Into<String>) -> std::io::Result<Self> {
		let executor = SerialExecutor::spawn(TaskClass::Writer, thread_name)?;
		tracing::debug!(thread = executor.name(), "access.writer.started");
		Ok(Self { executor })
	}

	/// Queues `job` behind every write already submitted.
	pub fn submit<F>(&self, job: F) -> Result<(), ExecutorClosed>
	where
		F: FnOnce() + Send + 'static,
	{
		self.executor.execute(job)
	}

	/// True when called on the writer thread.
	pub fn is_writer_thread(&self) -> bool {
		self.executor.is_current()
	}

	/// Write actions queued but not yet started.
	pub fn pending(&self) -> usize {
		self.executor.pending()
	}

	pub fn thread_name(&self) -> &str {
		self.executor.name()
	}

	/// Stops accepting work and waits for queued actions, unless called from
	/// the writer thread itself.
	pub fn shutdown(&self) {
		tracing::debug!(thread = self.executor.name(), pending = self.pending(), "access.writer.shutdown");
		self.executor.shutdown();
	}
}
