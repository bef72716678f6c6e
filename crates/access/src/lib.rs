//! Single-writer / multi-reader access control for the shared model.
//!
//! The model itself is not owned here. Code that touches it goes through an
//! [`AccessGate`]:
//!
//! * [`AccessGate::read_sync`] for reads, on any thread, concurrently;
//! * [`AccessGate::write_async`] for writes, funneled through one writer thread;
//! * [`AccessGate::run_write_action_unsafe`] for writes that must run on the
//!   calling thread, typically nested inside another write action.
//!
//! The gate sits on top of a pluggable [`LockCoordinator`]:
//! [`ReentrantCoordinator`] or [`StampedCoordinator`], selected through
//! [`AccessConfig`]. Subsystems that keep auxiliary state in sync with the
//! model subscribe to write-action boundaries with a [`WriteActionListener`].
//!
//! ```no_run
//! use xeno_access::{AccessConfig, AccessGate};
//!
//! let gate = AccessGate::new(AccessConfig::default())?;
//! let answer = gate.write_async(|| Ok::<_, std::convert::Infallible>(42)).wait();
//! assert_eq!(answer.ok(), Some(42));
//! assert!(gate.read_sync(|| !gate.is_write_access_allowed()));
//! # Ok::<(), xeno_access::AccessError>(())
//! ```

mod config;
mod coordinator;
mod error;
mod future;
mod gate;
pub mod listeners;
mod owner;
mod serializer;
mod stamp;

pub use config::AccessConfig;
pub use coordinator::{CoordinatorKind, LockCoordinator, ReentrantCoordinator, StampedCoordinator};
pub use error::{AccessError, LockError, StampError, WriteError};
pub use future::WriteFuture;
pub use gate::{AccessGate, ReadAccessToken, ReadDispatcher};
pub use listeners::{ListenerId, WriteActionListener, WriteActionPhase, WriteActionRecord};
pub use owner::OwnerId;
pub use serializer::WriteSerializer;
pub use stamp::{Stamp, StampMode, StampedLock};
