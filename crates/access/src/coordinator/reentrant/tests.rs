use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use super::*;

/// Runs `f` on another thread and returns its result.
fn elsewhere<R: Send + 'static>(coordinator: &Arc<ReentrantCoordinator>, f: impl FnOnce(&ReentrantCoordinator) -> R + Send + 'static) -> R {
	let coordinator = Arc::clone(coordinator);
	thread::spawn(move || f(&coordinator)).join().unwrap()
}

/// Holds exclusive mode on a helper thread until the returned sender fires.
fn hold_write_elsewhere(coordinator: &Arc<ReentrantCoordinator>) -> (mpsc::Sender<()>, thread::JoinHandle<()>) {
	let (locked_tx, locked_rx) = mpsc::channel();
	let (release_tx, release_rx) = mpsc::channel::<()>();
	let coordinator = Arc::clone(coordinator);
	let handle = thread::spawn(move || {
		coordinator.write_lock();
		locked_tx.send(()).unwrap();
		let _ = release_rx.recv();
		coordinator.write_unlock();
	});
	locked_rx.recv().unwrap();
	(release_tx, handle)
}

#[test]
fn nested_reads_are_counted_and_cleaned_up() {
	let c = ReentrantCoordinator::new();
	c.read_lock();
	c.read_lock();
	assert!(c.is_read_locked_by_current_thread());
	assert_eq!(c.read_hold_count(), 2);

	c.read_unlock();
	assert!(c.is_read_locked_by_current_thread());
	c.read_unlock();
	assert!(!c.is_read_locked_by_current_thread());
	assert_eq!(c.read_hold_count(), 0);
	assert!(c.reads.lock().is_empty());
}

#[test]
fn write_lock_is_reentrant() {
	let c = ReentrantCoordinator::new();
	c.write_lock();
	c.write_lock();
	assert_eq!(c.write_hold_count(), 2);
	assert!(c.is_write_locked_by_current_thread());

	c.write_unlock();
	assert!(c.is_write_locked_by_current_thread());
	c.write_unlock();
	assert!(!c.is_write_locked_by_current_thread());
	assert!(!c.is_write_locked());
}

#[test]
fn writer_excludes_readers_on_other_threads() {
	let c = Arc::new(ReentrantCoordinator::new());
	c.write_lock();
	assert!(!elsewhere(&c, |c| c.try_read_lock()));
	assert!(elsewhere(&c, |c| c.is_write_locked()));
	assert!(!elsewhere(&c, |c| c.is_write_locked_by_current_thread()));

	c.write_unlock();
	assert!(elsewhere(&c, |c| {
		let ok = c.try_read_lock();
		c.read_unlock();
		ok
	}));
}

#[test]
fn readers_exclude_writers_but_not_each_other() {
	let c = Arc::new(ReentrantCoordinator::new());
	c.read_lock();
	assert!(!elsewhere(&c, |c| c.try_write_lock()));
	assert!(elsewhere(&c, |c| {
		let ok = c.try_read_lock();
		c.read_unlock();
		ok
	}));
	c.read_unlock();
	assert!(elsewhere(&c, |c| {
		let ok = c.try_write_lock();
		c.write_unlock();
		ok
	}));
}

#[test]
fn writer_reads_are_tracked_apart_from_own_reads() {
	let c = ReentrantCoordinator::new();
	c.write_lock();
	c.read_lock();
	assert!(!c.is_read_locked_by_current_thread());
	assert_eq!(c.read_hold_count(), 1);
	c.read_unlock();
	c.write_unlock();
	assert_eq!(c.read_hold_count(), 0);
	assert!(!c.is_write_locked());
}

#[test]
fn releasing_write_with_outstanding_reads_downgrades() {
	let c = Arc::new(ReentrantCoordinator::new());
	c.write_lock();
	c.read_lock();
	c.write_unlock();

	assert!(c.is_read_locked_by_current_thread());
	assert!(!c.is_write_locked());
	assert!(!elsewhere(&c, |c| c.try_write_lock()));
	assert!(elsewhere(&c, |c| {
		let ok = c.try_read_lock();
		c.read_unlock();
		ok
	}));

	c.read_unlock();
	assert!(elsewhere(&c, |c| {
		let ok = c.try_write_lock();
		c.write_unlock();
		ok
	}));
}

#[test]
fn read_to_write_upgrade_panics() {
	let c = ReentrantCoordinator::new();
	c.read_lock();
	let result = catch_unwind(AssertUnwindSafe(|| c.write_lock()));
	assert!(result.is_err());
	assert!(!c.is_write_locked());
	c.read_unlock();
}

#[test]
fn timed_acquisition_gives_up() {
	let c = Arc::new(ReentrantCoordinator::new());
	let (release, handle) = hold_write_elsewhere(&c);

	assert_eq!(c.try_write_lock_for(Duration::from_millis(20)), Ok(false));
	assert_eq!(c.try_read_lock_for(Duration::from_millis(20)), Ok(false));
	assert_eq!(c.read_hold_count(), 0);

	release.send(()).unwrap();
	handle.join().unwrap();
	assert_eq!(c.try_write_lock_for(Duration::from_secs(5)), Ok(true));
	c.write_unlock();
}

#[test]
fn interruptible_acquisition_observes_cancellation() {
	let c = Arc::new(ReentrantCoordinator::new());
	let (release, handle) = hold_write_elsewhere(&c);

	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	let canceller = thread::spawn(move || {
		thread::sleep(Duration::from_millis(30));
		trigger.cancel();
	});
	assert_eq!(c.write_lock_interruptibly(&cancel), Err(LockError::Interrupted));
	assert_eq!(c.read_lock_interruptibly(&cancel), Err(LockError::Interrupted));
	canceller.join().unwrap();

	release.send(()).unwrap();
	handle.join().unwrap();
	assert_eq!(c.write_lock_interruptibly(&CancellationToken::new()), Ok(()));
	assert!(c.is_write_locked_by_current_thread());
	c.write_unlock();
}

#[test]
fn unbalanced_releases_are_ignored() {
	let c = ReentrantCoordinator::new();
	c.read_unlock();
	c.write_unlock();
	assert!(c.try_write_lock());
	c.write_unlock();
	assert!(c.try_read_lock());
	c.read_unlock();
}

#[test]
fn foreign_write_unlock_does_not_release() {
	let c = Arc::new(ReentrantCoordinator::new());
	c.write_lock();
	elsewhere(&c, |c| c.write_unlock());
	assert!(c.is_write_locked_by_current_thread());
	c.write_unlock();
}
