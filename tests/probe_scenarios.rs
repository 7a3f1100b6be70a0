//! Probe state machine scenarios on a paused tokio clock.

mod common;

use std::time::Duration;

use serde_json::{json, Value};

use common::ScriptedCheck;
use stackcheck::probe::{run_probe, ProbeError, RetryState};
use stackcheck::record::{RecordKind, RecordWriter};

#[tokio::test(start_paused = true)]
async fn test_reachable_after_five_failures_takes_six_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let check = ScriptedCheck::failing_first(5);
    let writer = RecordWriter::new(RecordKind::Mongodb, dir.path());

    let report = run_probe(&check, RetryState::new(30, Duration::from_secs(1)), writer)
        .await
        .unwrap();

    assert_eq!(report.attempts, 6);
    let calls = check.calls();
    assert_eq!(calls.len(), 6);
    for pair in calls.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(1), "gap {gap:?}");
        assert!(gap < Duration::from_millis(1010), "gap {gap:?}");
    }

    let record_path = dir.path().join("mongodb_status.json");
    assert_eq!(report.record_path, record_path);
    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&record_path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({
            "mongodb_status": {
                "prompt": "Is MongoDB connected?",
                "response": ["yes"],
                "tv": "Y"
            }
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let check = ScriptedCheck::always_failing();
    let writer = RecordWriter::new(RecordKind::Mongodb, dir.path());

    let result = run_probe(&check, RetryState::new(4, Duration::from_secs(1)), writer).await;

    match result {
        Err(ProbeError::Exhausted {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 4);
            assert_eq!(last_error.to_string(), "connection refused (attempt 4)");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(check.calls().len(), 4);
    assert!(!dir.path().join("mongodb_status.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success_does_not_wait() {
    let dir = tempfile::tempdir().unwrap();
    let check = ScriptedCheck::failing_first(0);
    let writer = RecordWriter::new(RecordKind::Mongodb, dir.path());
    let start = tokio::time::Instant::now();

    let report = run_probe(&check, RetryState::new(30, Duration::from_secs(1)), writer)
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(check.calls().len(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(report.record_path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_success_on_last_allowed_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let check = ScriptedCheck::failing_first(2);
    let writer = RecordWriter::new(RecordKind::Mongodb, dir.path());

    let report = run_probe(&check, RetryState::new(3, Duration::from_secs(1)), writer)
        .await
        .unwrap();

    assert_eq!(report.attempts, 3);
    assert!(dir.path().join("mongodb_status.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_unwritable_runtime_dir_fails_after_success() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the runtime directory should be
    let blocker = dir.path().join("runtime");
    std::fs::write(&blocker, "not a directory").unwrap();
    let check = ScriptedCheck::failing_first(0);
    let writer = RecordWriter::new(RecordKind::Mongodb, &blocker);

    let result = run_probe(&check, RetryState::new(3, Duration::from_secs(1)), writer).await;

    assert!(matches!(result, Err(ProbeError::Record(_))));
    assert_eq!(check.calls().len(), 1);
}
