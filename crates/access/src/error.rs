//! Error types for lock acquisition and write actions.

use thiserror::Error;

use crate::coordinator::CoordinatorKind;
use crate::stamp::StampMode;

/// Errors from blocking-with-limits lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
	/// The coordinator variant does not implement this acquisition mode.
	#[error("{operation} is not supported by the {variant} coordinator")]
	Unsupported {
		/// Variant that rejected the call.
		variant: CoordinatorKind,
		/// Name of the rejected operation.
		operation: &'static str,
	},

	/// Cancellation was observed while waiting for the lock.
	#[error("lock acquisition was interrupted")]
	Interrupted,
}

/// Errors from releasing or validating a [`Stamp`](crate::Stamp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StampError {
	/// The stamp was issued for a different mode than the release asked for.
	#[error("expected a {expected} stamp, got a {actual} stamp")]
	ModeMismatch { expected: StampMode, actual: StampMode },

	/// The stamp does not describe a hold that is currently outstanding.
	///
	/// Read stamps of the current epoch are indistinguishable, so a foreign
	/// read stamp is only caught once no read hold remains.
	#[error("stamp {0:#x} does not match the current lock state")]
	Stale(u64),
}

/// Failure of a write action submitted through [`AccessGate::write_async`](crate::AccessGate::write_async).
#[derive(Debug, Error)]
pub enum WriteError<E> {
	/// The computation returned an error; it is carried unchanged.
	#[error("write action failed: {0}")]
	Action(E),

	/// The computation panicked. Locks and notifications were still unwound.
	#[error("write action panicked: {0}")]
	Panicked(String),

	/// The write serializer shut down before the action could run.
	#[error("write serializer is no longer running")]
	WriterStopped,
}

impl<E> WriteError<E> {
	/// Returns the computation's own error, if that is what failed.
	pub fn into_action(self) -> Option<E> {
		match self {
			Self::Action(err) => Some(err),
			_ => None,
		}
	}
}

/// Errors constructing an [`AccessGate`](crate::AccessGate).
#[derive(Debug, Error)]
pub enum AccessError {
	/// The writer thread could not be started.
	#[error("failed to start write serializer: {0}")]
	Spawn(#[from] std::io::Error),

	/// The configuration could not be parsed.
	#[error("invalid access config: {0}")]
	Config(#[from] toml::de::Error),
}
