use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use super::*;

fn elsewhere<R: Send + 'static>(coordinator: &Arc<StampedCoordinator>, f: impl FnOnce(&StampedCoordinator) -> R + Send + 'static) -> R {
	let coordinator = Arc::clone(coordinator);
	thread::spawn(move || f(&coordinator)).join().unwrap()
}

#[test]
fn slot_tracks_mode_of_current_thread() {
	let c = StampedCoordinator::new();
	c.read_lock();
	assert!(c.is_read_locked_by_current_thread());
	assert!(!c.is_write_locked_by_current_thread());
	c.read_unlock();
	assert_eq!(c.current_stamp(), None);

	c.write_lock();
	assert!(c.is_write_locked_by_current_thread());
	assert!(!c.is_read_locked_by_current_thread());
	assert!(c.is_write_locked());
	c.write_unlock();
	assert!(!c.is_write_locked());
}

#[test]
fn slots_are_per_thread() {
	let c = Arc::new(StampedCoordinator::new());
	c.read_lock();
	assert!(!elsewhere(&c, |c| c.is_read_locked_by_current_thread()));
	assert!(elsewhere(&c, |c| {
		let ok = c.try_read_lock();
		c.read_unlock();
		ok
	}));
	assert!(!elsewhere(&c, |c| c.try_write_lock()));
	c.read_unlock();
}

#[test]
fn writer_excludes_other_threads() {
	let c = Arc::new(StampedCoordinator::new());
	c.write_lock();
	assert!(!elsewhere(&c, |c| c.try_read_lock()));
	assert!(!elsewhere(&c, |c| c.try_write_lock()));
	assert!(elsewhere(&c, |c| c.is_write_locked()));
	c.write_unlock();
	assert!(elsewhere(&c, |c| {
		let ok = c.try_write_lock();
		c.write_unlock();
		ok
	}));
}

#[test]
fn failed_try_acquire_stores_nothing() {
	let c = Arc::new(StampedCoordinator::new());
	c.write_lock();
	assert!(elsewhere(&c, |c| {
		let acquired = c.try_read_lock();
		!acquired && c.current_stamp().is_none()
	}));
	c.write_unlock();
}

#[test]
fn release_without_stamp_is_a_noop() {
	let c = StampedCoordinator::new();
	c.read_unlock();
	c.write_unlock();

	c.write_lock();
	c.write_unlock();
	c.write_unlock();
	assert!(c.try_write_lock());
	c.write_unlock();
}

#[test]
fn foreign_release_leaves_holder_untouched() {
	let c = Arc::new(StampedCoordinator::new());
	c.write_lock();
	elsewhere(&c, |c| c.write_unlock());
	assert!(c.is_write_locked_by_current_thread());
	assert!(c.is_write_locked());
	c.write_unlock();
}

fn unsupported(operation: &'static str) -> LockError {
	LockError::Unsupported {
		variant: CoordinatorKind::Stamped,
		operation,
	}
}

#[test]
fn timed_and_interruptible_waits_are_unsupported() {
	let c = StampedCoordinator::new();
	let cancel = CancellationToken::new();
	assert_eq!(c.try_read_lock_for(Duration::from_millis(1)), Err(unsupported("try_read_lock_for")));
	assert_eq!(c.try_write_lock_for(Duration::from_millis(1)), Err(unsupported("try_write_lock_for")));
	assert_eq!(c.read_lock_interruptibly(&cancel), Err(unsupported("read_lock_interruptibly")));
	assert_eq!(c.write_lock_interruptibly(&cancel), Err(unsupported("write_lock_interruptibly")));
	assert_eq!(c.current_stamp(), None);
}

#[test]
fn read_to_write_upgrade_panics() {
	let c = StampedCoordinator::new();
	c.read_lock();
	assert!(catch_unwind(AssertUnwindSafe(|| c.write_lock())).is_err());
	assert!(c.is_read_locked_by_current_thread());
	c.read_unlock();
}

#[test]
fn optimistic_read_through_coordinator() {
	let c = StampedCoordinator::new();
	let stamp = c.stamped_lock().try_optimistic_read().unwrap();
	c.write_lock();
	c.write_unlock();
	assert!(!c.stamped_lock().validate(stamp));
}
