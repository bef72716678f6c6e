//! Access gate configuration.
//!
//! Configuration can be built programmatically or parsed from a TOML table:
//!
//! ```toml
//! coordinator = "stamped"
//! writer_thread_name = "model-writer"
//! slow_write_threshold_ms = 250
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::coordinator::CoordinatorKind;
use crate::error::AccessError;

const DEFAULT_WRITER_THREAD_NAME: &str = "xeno-writer";
const DEFAULT_SLOW_WRITE_THRESHOLD_MS: u64 = 1000;

/// Settings for constructing an [`AccessGate`](crate::AccessGate).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
	/// Lock strategy backing the gate.
	pub coordinator: CoordinatorKind,
	/// Name given to the write serializer thread.
	pub writer_thread_name: String,
	/// Write-lock waits longer than this are logged as warnings. `None` disables the check.
	pub slow_write_threshold_ms: Option<u64>,
}

impl Default for AccessConfig {
	fn default() -> Self {
		Self {
			coordinator: CoordinatorKind::default(),
			writer_thread_name: DEFAULT_WRITER_THREAD_NAME.to_owned(),
			slow_write_threshold_ms: Some(DEFAULT_SLOW_WRITE_THRESHOLD_MS),
		}
	}
}

impl AccessConfig {
	/// Parses a configuration table; missing keys take their defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, AccessError> {
		Ok(toml::from_str(input)?)
	}

	#[must_use]
	pub fn with_coordinator(mut self, coordinator: CoordinatorKind) -> Self {
		self.coordinator = coordinator;
		self
	}

	#[must_use]
	pub fn with_writer_thread_name(mut self, name: impl Into<String>) -> Self {
		self.writer_thread_name = name.into();
		self
	}

	#[must_use]
	pub fn with_slow_write_threshold(mut self, threshold: Option<Duration>) -> Self {
		self.slow_write_threshold_ms = threshold.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
		self
	}

	/// Slow-write threshold as a [`Duration`].
	pub fn slow_write_threshold(&self) -> Option<Duration> {
		self.slow_write_threshold_ms.map(Duration::from_millis)
	}
}
