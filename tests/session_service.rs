//! End-to-end tests for the session service against real ptys.
//!
//! The exec template is pointed at `/bin/sh -c`, so a session's "target" is
//! a shell script: `cat` gives a long-lived echoing child, `exit 0` gives an
//! immediate end-of-stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dockterm::config::Config;
use dockterm::error::SessionError;
use dockterm::events::{EventSink, ServerEvent, CLOSED_NOTICE};
use dockterm::service::SessionService;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, ServerEvent)>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, session_id: &str, event: ServerEvent) {
        self.events
            .lock()
            .unwrap()
            .push((session_id.to_string(), event));
    }
}

impl RecordingSink {
    fn output_for(&self, session_id: &str) -> String {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, ServerEvent::PtyOutput { output })| output.as_str())
            .collect()
    }

    fn closed_notices(&self, session_id: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, event)| {
                id == session_id
                    && matches!(event, ServerEvent::PtyOutput { output } if output == CLOSED_NOTICE)
            })
            .count()
    }
}

fn test_config(max_sessions: usize) -> Config {
    Config {
        max_sessions,
        exec_command: vec!["/bin/sh".into(), "-c".into()],
        shell: "sh".into(),
        initial_rows: 24,
        initial_cols: 80,
        ..Config::default()
    }
}

fn service_with_sink(max_sessions: usize) -> (Arc<SessionService>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let service = SessionService::new(&test_config(max_sessions), sink.clone());
    (service, sink)
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

fn teardown(service: &Arc<SessionService>, ids: &[&str]) {
    for id in ids {
        service.on_disconnect(id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn six_connects_succeed_seventh_is_rejected() {
    let (service, _sink) = service_with_sink(6);
    let ids: Vec<String> = (1..=6).map(|i| format!("c{}", i)).collect();
    for id in &ids {
        service.on_connect(id, "cat").unwrap();
    }
    assert_eq!(service.session_count(), 6);

    let err = service.on_connect("c7", "cat").unwrap_err();
    assert!(matches!(err, SessionError::CapacityExceeded { limit: 6 }));
    assert_eq!(service.session_count(), 6);
    assert!(service.lookup("c7").is_none());

    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    teardown(&service, &id_refs);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_is_idempotent_per_session_id() {
    let (service, _sink) = service_with_sink(6);
    service.on_connect("s1", "cat").unwrap();
    let pid = service.lookup("s1").unwrap().pid;

    let err = service.on_connect("s1", "cat").unwrap_err();
    assert!(matches!(err, SessionError::AlreadyConnected));
    assert_eq!(service.session_count(), 1);
    assert_eq!(service.lookup("s1").unwrap().pid, pid);

    teardown(&service, &["s1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn input_reaches_only_the_addressed_session() {
    let (service, sink) = service_with_sink(6);
    service.on_connect("s1", "cat").unwrap();
    service.on_connect("s2", "cat").unwrap();

    service.on_input("s1", "marker-for-s1\n");
    assert!(wait_until(|| sink.output_for("s1").contains("marker-for-s1")).await);
    assert!(!sink.output_for("s2").contains("marker-for-s1"));

    service.on_input("s2", "marker-for-s2\n");
    assert!(wait_until(|| sink.output_for("s2").contains("marker-for-s2")).await);
    assert!(!sink.output_for("s1").contains("marker-for-s2"));

    teardown(&service, &["s1", "s2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn child_exit_emits_one_closed_notice_and_removes_the_session() {
    let (service, sink) = service_with_sink(6);
    service.on_connect("s1", "exit 0").unwrap();

    assert!(
        wait_until(|| service.lookup("s1").is_none() && sink.closed_notices("s1") == 1).await
    );

    // The notice must stay a one-off after removal.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.closed_notices("s1"), 1);
    assert_eq!(service.session_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exit_of_one_session_leaves_the_other_running() {
    let (service, sink) = service_with_sink(6);
    service.on_connect("doomed", "exit 0").unwrap();
    service.on_connect("survivor", "cat").unwrap();

    assert!(wait_until(|| service.lookup("doomed").is_none()).await);
    assert_eq!(sink.closed_notices("survivor"), 0);

    service.on_input("survivor", "still-here\n");
    assert!(wait_until(|| sink.output_for("survivor").contains("still-here")).await);

    teardown(&service, &["survivor"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_input_and_resize_are_dropped_silently() {
    let (service, sink) = service_with_sink(6);
    service.on_input("ghost", "boo\n");
    service.on_resize("ghost", 40, 120);
    assert_eq!(service.session_count(), 0);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resize_leaves_other_sessions_untouched() {
    let (service, sink) = service_with_sink(6);
    service.on_connect("s1", "cat").unwrap();
    service.on_connect("s2", "cat").unwrap();

    service.on_resize("s1", 30, 100);

    // s2 keeps working as before.
    service.on_input("s2", "after-resize\n");
    assert!(wait_until(|| sink.output_for("s2").contains("after-resize")).await);
    assert_eq!(sink.closed_notices("s2"), 0);

    teardown(&service, &["s1", "s2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn output_preserves_per_session_order() {
    let (service, sink) = service_with_sink(6);
    service.on_connect("s1", "cat").unwrap();

    service.on_input("s1", "first-line\n");
    service.on_input("s1", "second-line\n");
    service.on_input("s1", "third-line\n");

    assert!(wait_until(|| sink.output_for("s1").contains("third-line")).await);
    let output = sink.output_for("s1");
    let first = output.find("first-line").expect("first line echoed");
    let second = output.find("second-line").expect("second line echoed");
    let third = output.find("third-line").expect("third line echoed");
    assert!(first < second && second < third);

    teardown(&service, &["s1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_tears_down_and_frees_capacity() {
    let (service, _sink) = service_with_sink(1);
    service.on_connect("s1", "cat").unwrap();
    assert!(matches!(
        service.on_connect("s2", "cat"),
        Err(SessionError::CapacityExceeded { .. })
    ));

    service.on_disconnect("s1");
    assert!(service.lookup("s1").is_none());

    service.on_connect("s2", "cat").unwrap();
    assert_eq!(service.session_count(), 1);
    teardown(&service, &["s2"]);
}
