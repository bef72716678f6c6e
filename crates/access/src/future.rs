//! Completion handle for asynchronously scheduled write actions.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::WriteError;

pub(crate) type WriteOutcome<T, E> = Result<T, WriteError<E>>;

enum State<T, E> {
	Ready(Option<WriteOutcome<T, E>>),
	Pending(oneshot::Receiver<WriteOutcome<T, E>>),
}

/// Resolves to the result of a write action.
///
/// Await it from async code or call [`WriteFuture::wait`] from a plain
/// thread. Dropping it does not cancel the write.
#[must_use = "dropping a WriteFuture discards the write action's result"]
pub struct WriteFuture<T, E> {
	state: State<T, E>,
}

// No pinned projection of `T` or `E` is ever created.
impl<T, E> Unpin for WriteFuture<T, E> {}

impl<T, E> std::fmt::Debug for WriteFuture<T, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = match &self.state {
			State::Ready(Some(_)) => "ready",
			State::Ready(None) => "taken",
			State::Pending(_) => "pending",
		};
		f.debug_struct("WriteFuture").field("state", &state).finish()
	}
}

impl<T, E> WriteFuture<T, E> {
	pub(crate) fn ready(outcome: WriteOutcome<T, E>) -> Self {
		Self {
			state: State::Ready(Some(outcome)),
		}
	}

	pub(crate) fn pending(rx: oneshot::Receiver<WriteOutcome<T, E>>) -> Self {
		Self { state: State::Pending(rx) }
	}

	/// True if the result is available without waiting.
	pub fn is_ready(&self) -> bool {
		match &self.state {
			State::Ready(outcome) => outcome.is_some(),
			State::Pending(rx) => !rx.is_empty() || rx.is_terminated(),
		}
	}

	/// Blocks the calling thread until the write action completes.
	///
	/// # Panics
	///
	/// Panics if called from within an asynchronous execution context; await
	/// the future there instead. Calling this while holding read access
	/// deadlocks, since the write cannot start until that access is released.
	pub fn wait(self) -> WriteOutcome<T, E> {
		match self.state {
			State::Ready(outcome) => outcome.unwrap_or(Err(WriteError::WriterStopped)),
			State::Pending(rx) => rx.blocking_recv().unwrap_or(Err(WriteError::WriterStopped)),
		}
	}
}

impl<T, E> Future for WriteFuture<T, E> {
	type Output = WriteOutcome<T, E>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().state {
			State::Ready(outcome) => Poll::Ready(outcome.take().unwrap_or(Err(WriteError::WriterStopped))),
			State::Pending(rx) => Pin::new(rx).poll(cx).map(|received| received.unwrap_or(Err(WriteError::WriterStopped))),
		}
	}
}
