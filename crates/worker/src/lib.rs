//! Worker thread primitives shared across xeno crates.
//!
//! Provides classified thread spawning and a [`SerialExecutor`] that funnels
//! work through one dedicated thread.

mod class;
mod panic;
mod serial;
mod spawn;

pub use class::TaskClass;
pub use panic::panic_message;
pub use serial::{ExecutorClosed, Job, SerialExecutor};
pub use spawn::{spawn_named_thread, spawn_thread};
