use std::any::Any;

/// Extracts a human-readable message from a caught panic payload.
///
/// `panic!` with a literal produces a `&'static str` payload, formatted panics
/// produce a `String`. Anything else is reported generically.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return (*msg).to_owned();
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return msg.clone();
	}
	String::from("<non-string panic payload>")
}

#[cfg(test)]
mod tests;
