use parking_lot::Mutex;

use super::*;

struct Recorder {
	tag: &'static str,
	log: Arc<Mutex<Vec<String>>>,
}

impl WriteActionListener for Recorder {
	fn before_write_action_start(&self, action: &WriteActionRecord) {
		self.log.lock().push(format!("{}:before:{}", self.tag, action.id()));
	}

	fn write_action_started(&self, action: &WriteActionRecord) {
		self.log.lock().push(format!("{}:started:{}", self.tag, action.id()));
	}

	fn write_action_finished(&self, action: &WriteActionRecord) {
		self.log.lock().push(format!("{}:finished:{}", self.tag, action.id()));
	}

	fn after_write_action_finished(&self, action: &WriteActionRecord) {
		self.log.lock().push(format!("{}:after:{}", self.tag, action.id()));
	}
}

struct Panicking;

impl WriteActionListener for Panicking {
	fn write_action_started(&self, _action: &WriteActionRecord) {
		panic!("listener failure");
	}
}

fn record(id: u64) -> WriteActionRecord {
	WriteActionRecord::new(id, Cow::Borrowed("test"), 0)
}

#[test]
fn broadcasts_in_registration_order() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let listeners = WriteActionListeners::new();
	listeners.add(Arc::new(Recorder { tag: "a", log: Arc::clone(&log) }));
	listeners.add(Arc::new(Recorder { tag: "b", log: Arc::clone(&log) }));

	listeners.fire(WriteActionPhase::BeforeStart, &record(1));
	listeners.fire(WriteActionPhase::AfterFinished, &record(1));

	assert_eq!(*log.lock(), ["a:before:1", "b:before:1", "a:after:1", "b:after:1"]);
}

#[test]
fn removed_listener_is_not_notified() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let listeners = WriteActionListeners::new();
	let a = listeners.add(Arc::new(Recorder { tag: "a", log: Arc::clone(&log) }));
	listeners.add(Arc::new(Recorder { tag: "b", log: Arc::clone(&log) }));

	assert!(listeners.remove(a));
	assert!(!listeners.remove(a));
	assert_eq!(listeners.len(), 1);

	listeners.fire(WriteActionPhase::Started, &record(2));
	assert_eq!(*log.lock(), ["b:started:2"]);
}

#[test]
fn panicking_listener_does_not_stop_broadcast() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let listeners = WriteActionListeners::new();
	listeners.add(Arc::new(Panicking));
	listeners.add(Arc::new(Recorder { tag: "a", log: Arc::clone(&log) }));

	listeners.fire(WriteActionPhase::Started, &record(3));
	assert_eq!(*log.lock(), ["a:started:3"]);
}

#[test]
fn listener_may_unregister_itself_during_broadcast() {
	struct OneShot {
		listeners: Arc<WriteActionListeners>,
		id: Mutex<Option<ListenerId>>,
		calls: Mutex<usize>,
	}

	impl WriteActionListener for OneShot {
		fn write_action_started(&self, _action: &WriteActionRecord) {
			*self.calls.lock() += 1;
			if let Some(id) = self.id.lock().take() {
				self.listeners.remove(id);
			}
		}
	}

	let listeners = Arc::new(WriteActionListeners::new());
	let one_shot = Arc::new(OneShot {
		listeners: Arc::clone(&listeners),
		id: Mutex::new(None),
		calls: Mutex::new(0),
	});
	let id = listeners.add(one_shot.clone());
	*one_shot.id.lock() = Some(id);

	listeners.fire(WriteActionPhase::Started, &record(4));
	listeners.fire(WriteActionPhase::Started, &record(5));
	assert_eq!(*one_shot.calls.lock(), 1);
	assert!(listeners.is_empty());
}

#[test]
fn record_reports_nesting() {
	let outer = WriteActionRecord::new(1, Cow::Borrowed("outer"), 0);
	let inner = WriteActionRecord::new(2, Cow::Owned(String::from("inner")), 1);
	assert!(!outer.is_nested());
	assert!(inner.is_nested());
	assert_eq!(inner.label(), "inner");
}
