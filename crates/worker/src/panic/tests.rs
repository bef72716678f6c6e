use std::panic::catch_unwind;

use super::panic_message;

#[test]
fn extracts_static_str_payload() {
	let err = catch_unwind(|| panic!("boom-str")).unwrap_err();
	let msg = panic_message(err.as_ref());
	assert!(msg.contains("boom-str"), "expected 'boom-str', got: {msg}");
}

#[test]
fn extracts_string_payload() {
	let err = catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
	let msg = panic_message(err.as_ref());
	assert!(msg.contains("boom-string"), "expected 'boom-string', got: {msg}");
}

#[test]
fn reports_opaque_payloads_generically() {
	let err = catch_unwind(|| std::panic::panic_any(17u32)).unwrap_err();
	assert_eq!(panic_message(err.as_ref()), "<non-string panic payload>");
}
