/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Serialized model mutations executed on the dedicated writer thread.
	Writer,
	/// Model reads executed inline by whichever thread asks for them.
	Reader,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Writer => "writer",
			Self::Reader => "reader",
		}
	}
}
