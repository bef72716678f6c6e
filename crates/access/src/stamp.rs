//! Stamp-issuing reader/writer lock.
//!
//! [`StampedLock`] does not remember who holds it. Every successful
//! acquisition returns a [`Stamp`] and the same stamp must be handed back to
//! release that hold. A version counter is bumped on every write acquisition
//! and release (odd while a writer holds the lock), which also allows
//! optimistic reads: take a stamp without blocking, read, then
//! [`validate`](StampedLock::validate) that no writer intervened.
//!
//! The lock prefers writers: once a writer is waiting, new blocking readers
//! queue behind it.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering, fence};

use parking_lot::{Condvar, Mutex};

use crate::error::StampError;

const MODE_BITS: u32 = 2;
const MODE_MASK: u64 = (1 << MODE_BITS) - 1;
const MODE_READ: u64 = 0b01;
const MODE_WRITE: u64 = 0b10;
const MODE_OPTIMISTIC: u64 = 0b11;

/// Access mode a [`Stamp`] was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StampMode {
	Read,
	Write,
	/// Non-blocking read that holds nothing and must be validated.
	Optimistic,
}

impl StampMode {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
			Self::Optimistic => "optimistic",
		}
	}

	const fn bits(self) -> u64 {
		match self {
			Self::Read => MODE_READ,
			Self::Write => MODE_WRITE,
			Self::Optimistic => MODE_OPTIMISTIC,
		}
	}
}

impl fmt::Display for StampMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Opaque token for one acquisition of a [`StampedLock`].
///
/// Encodes the lock version at acquisition time and the [`StampMode`]. The
/// raw value `0` is never a valid stamp; it is the failure sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp(NonZeroU64);

impl Stamp {
	fn new(version: u64, mode: StampMode) -> Self {
		match NonZeroU64::new((version << MODE_BITS) | mode.bits()) {
			Some(raw) => Self(raw),
			None => unreachable!("mode bits are never zero"),
		}
	}

	/// Reinterprets a raw stamp value. Returns `None` for the failure sentinel
	/// and for values that carry no mode.
	pub fn from_raw(raw: u64) -> Option<Self> {
		if raw & MODE_MASK == 0 {
			return None;
		}
		NonZeroU64::new(raw).map(Self)
	}

	pub const fn raw(self) -> u64 {
		self.0.get()
	}

	pub const fn mode(self) -> StampMode {
		match self.0.get() & MODE_MASK {
			MODE_READ => StampMode::Read,
			MODE_WRITE => StampMode::Write,
			_ => StampMode::Optimistic,
		}
	}

	const fn version(self) -> u64 {
		self.0.get() >> MODE_BITS
	}
}

impl fmt::Debug for Stamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Stamp").field("version", &self.version()).field("mode", &self.mode()).finish()
	}
}

#[derive(Debug, Default)]
struct StampState {
	readers: usize,
	writer: bool,
	waiting_writers: usize,
}

/// Writer-preferring lock that hands out [`Stamp`]s instead of tracking owners.
#[derive(Debug, Default)]
pub struct StampedLock {
	state: Mutex<StampState>,
	changed: Condvar,
	/// Bumped on write acquire and on write release; odd while write-locked.
	version: AtomicU64,
}

impl StampedLock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Blocks until shared access is granted.
	pub fn read_lock(&self) -> Stamp {
		let mut state = self.state.lock();
		while state.writer || state.waiting_writers > 0 {
			self.changed.wait(&mut state);
		}
		state.readers += 1;
		Stamp::new(self.version.load(Ordering::Acquire), StampMode::Read)
	}

	/// Grants shared access unless a writer currently holds the lock.
	pub fn try_read_lock(&self) -> Option<Stamp> {
		let mut state = self.state.lock();
		if state.writer {
			return None;
		}
		state.readers += 1;
		Some(Stamp::new(self.version.load(Ordering::Acquire), StampMode::Read))
	}

	/// Blocks until exclusive access is granted.
	pub fn write_lock(&self) -> Stamp {
		let mut state = self.state.lock();
		state.waiting_writers += 1;
		while state.writer || state.readers > 0 {
			self.changed.wait(&mut state);
		}
		state.waiting_writers -= 1;
		self.enter_write(&mut state)
	}

	/// Grants exclusive access only if the lock is entirely free.
	pub fn try_write_lock(&self) -> Option<Stamp> {
		let mut state = self.state.lock();
		if state.writer || state.readers > 0 {
			return None;
		}
		Some(self.enter_write(&mut state))
	}

	fn enter_write(&self, state: &mut StampState) -> Stamp {
		state.writer = true;
		let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
		Stamp::new(version, StampMode::Write)
	}

	/// Returns an optimistic stamp, or `None` while a writer holds the lock.
	pub fn try_optimistic_read(&self) -> Option<Stamp> {
		let version = self.version.load(Ordering::Acquire);
		(version % 2 == 0).then(|| Stamp::new(version, StampMode::Optimistic))
	}

	/// Returns `true` if no write has been acquired since `stamp` was issued.
	///
	/// Read and write stamps stay valid for as long as they are held.
	pub fn validate(&self, stamp: Stamp) -> bool {
		fence(Ordering::Acquire);
		stamp.version() == self.version.load(Ordering::Acquire)
	}

	/// Releases a hold obtained from [`Self::read_lock`] or [`Self::try_read_lock`].
	///
	/// Read holds are counted, not owned: every read stamp issued in the
	/// current write epoch carries the same version, so any of them releases
	/// one hold, including a copy of another thread's stamp. Only stamps from
	/// an earlier epoch, or a release with no outstanding read hold, are
	/// rejected as [`StampError::Stale`]. Callers that need per-owner release
	/// keep one stamp per owner, as [`StampedCoordinator`](crate::StampedCoordinator) does.
	pub fn unlock_read(&self, stamp: Stamp) -> Result<(), StampError> {
		expect_mode(stamp, StampMode::Read)?;
		let mut state = self.state.lock();
		if state.readers == 0 || stamp.version() != self.version.load(Ordering::Acquire) {
			return Err(StampError::Stale(stamp.raw()));
		}
		state.readers -= 1;
		if state.readers == 0 {
			self.changed.notify_all();
		}
		Ok(())
	}

	/// Releases a hold obtained from [`Self::write_lock`] or [`Self::try_write_lock`].
	pub fn unlock_write(&self, stamp: Stamp) -> Result<(), StampError> {
		expect_mode(stamp, StampMode::Write)?;
		let mut state = self.state.lock();
		if !state.writer || stamp.version() != self.version.load(Ordering::Acquire) {
			return Err(StampError::Stale(stamp.raw()));
		}
		state.writer = false;
		self.version.fetch_add(1, Ordering::AcqRel);
		self.changed.notify_all();
		Ok(())
	}

	/// Releases whichever mode `stamp` was issued for.
	pub fn unlock(&self, stamp: Stamp) -> Result<(), StampError> {
		match stamp.mode() {
			StampMode::Read => self.unlock_read(stamp),
			StampMode::Write => self.unlock_write(stamp),
			StampMode::Optimistic => Err(StampError::Stale(stamp.raw())),
		}
	}

	pub fn is_write_locked(&self) -> bool {
		self.version.load(Ordering::Acquire) % 2 == 1
	}

	/// Number of outstanding read holds.
	pub fn read_lock_count(&self) -> usize {
		self.state.lock().readers
	}
}

fn expect_mode(stamp: Stamp, expected: StampMode) -> Result<(), StampError> {
	let actual = stamp.mode();
	if actual == expected {
		Ok(())
	} else {
		Err(StampError::ModeMismatch { expected, actual })
	}
}
