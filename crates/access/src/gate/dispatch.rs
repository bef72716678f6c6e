use xeno_worker::TaskClass;

use super::AccessGate;

/// Runs reads immediately on the calling thread.
///
/// Unlike writes, reads have no thread affinity: the caller becomes a reader
/// for the duration of the call.
#[derive(Debug, Clone)]
pub struct ReadDispatcher {
	gate: AccessGate,
}

impl ReadDispatcher {
	pub(super) fn new(gate: AccessGate) -> Self {
		Self { gate }
	}

	pub fn execute(&self, action: impl FnOnce()) {
		self.compute(action);
	}

	pub fn compute<T>(&self, compute: impl FnOnce() -> T) -> T {
		tracing::trace!(worker_class = TaskClass::Reader.as_str(), "access.read.dispatch");
		self.gate.read_sync(compute)
	}
}
