//! Integration tests for the rating request scheduler.
//!
//! These tests drive the scheduler end to end against the SQLite counter
//! store, covering version upgrades, immediate and deferred requests, and
//! cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rateprompt_core::{
    CounterSnapshot, CounterStore, HostServices, ManualExecutor, PendingState, PromptConfig,
    RequestDelay, RequestOutcome, RequestScheduler, SqliteCounterStore, StaticVersion,
    Thresholds, TokioExecutor,
};

#[derive(Default)]
struct Recorder {
    prompts: AtomicUsize,
    decisions: Mutex<Vec<CounterSnapshot>>,
}

impl Recorder {
    fn config(self: &Arc<Self>, thresholds: Thresholds) -> PromptConfig {
        let recorder = Arc::clone(self);
        PromptConfig::new(thresholds)
            .on_decision(move |snapshot| recorder.decisions.lock().unwrap().push(snapshot))
    }

    fn host(self: &Arc<Self>, version: &str, executor: Arc<dyn rateprompt_core::Executor>) -> HostServices {
        let recorder = Arc::clone(self);
        HostServices::new(
            Arc::new(StaticVersion::new(version)),
            Arc::new(move || {
                recorder.prompts.fetch_add(1, Ordering::SeqCst);
            }),
            executor,
        )
    }

    fn decisions(&self) -> usize {
        self.decisions.lock().unwrap().len()
    }

    fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[test]
fn test_upgrade_resets_persisted_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.db");
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(ManualExecutor::new());

    {
        let store = SqliteCounterStore::open_at(&path).unwrap();
        let s = RequestScheduler::new(
            recorder.config(Thresholds::new(0, 10, 10)),
            store,
            recorder.host("100", executor.clone()),
        )
        .unwrap();
        s.record_session().unwrap();
        s.record_significant_event(5).unwrap();
        assert_eq!(s.snapshot().unwrap().app_sessions_count, 1);
    }

    // Same build relaunching keeps counters
    {
        let store = SqliteCounterStore::open_at(&path).unwrap();
        let s = RequestScheduler::new(
            recorder.config(Thresholds::new(0, 10, 10)),
            store,
            recorder.host("100", executor.clone()),
        )
        .unwrap();
        let snapshot = s.snapshot().unwrap();
        assert_eq!(snapshot.app_sessions_count, 1);
        assert_eq!(snapshot.rating_events_count, 5);
        assert!(snapshot.first_open_date.is_some());
    }

    // New build starts a fresh window
    let store = SqliteCounterStore::open_at(&path).unwrap();
    let s = RequestScheduler::new(
        recorder.config(Thresholds::new(0, 10, 10)),
        store,
        recorder.host("101", executor),
    )
    .unwrap();
    let snapshot = s.snapshot().unwrap();
    assert_eq!(snapshot.app_sessions_count, 0);
    assert_eq!(snapshot.rating_events_count, 0);
    assert!(snapshot.first_open_date.is_none());
    s.with_store(|store| {
        assert_eq!(
            store.current_app_version_for_counters().unwrap().as_deref(),
            Some("101")
        );
    });
}

#[test]
fn test_session_threshold_scenario() {
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(ManualExecutor::new());
    let s = RequestScheduler::new(
        recorder.config(Thresholds::new(0, 1, 0)),
        SqliteCounterStore::open_memory().unwrap(),
        recorder.host("42", executor),
    )
    .unwrap();

    assert_eq!(
        s.request_evaluation(RequestDelay::Immediate).unwrap(),
        RequestOutcome::NotEligible
    );
    assert_eq!(recorder.decisions(), 0);

    s.record_session().unwrap();
    assert_eq!(
        s.request_evaluation(RequestDelay::Immediate).unwrap(),
        RequestOutcome::Prompted
    );
    assert_eq!(recorder.decisions(), 1);
    assert_eq!(recorder.prompts(), 1);
    assert_eq!(
        s.snapshot().unwrap().last_version_prompted_for_rating.as_deref(),
        Some("42")
    );

    // Version gate now closed even though sessions and events pass again
    s.record_session().unwrap();
    assert!(s.verdict().unwrap().sessions_passed);
    assert!(!s.verdict().unwrap().version_passed);
    assert_eq!(
        s.request_evaluation(RequestDelay::Immediate).unwrap(),
        RequestOutcome::NotEligible
    );
    assert_eq!(recorder.decisions(), 1);
}

#[test]
fn test_cancelled_deferred_request_never_fires() {
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(ManualExecutor::new());
    let s = RequestScheduler::new(
        recorder.config(Thresholds::default()),
        SqliteCounterStore::open_memory().unwrap(),
        recorder.host("1", executor.clone()),
    )
    .unwrap();

    s.request_evaluation(RequestDelay::After(Duration::from_secs(1))).unwrap();
    s.cancel_pending();

    executor.advance(Duration::from_millis(500));
    executor.advance(Duration::from_secs(60));
    assert_eq!(recorder.decisions(), 0);
    assert_eq!(recorder.prompts(), 0);
    assert_eq!(s.pending_state(), PendingState::Cancelled);
}

#[test]
fn test_deferred_request_fires_exactly_once() {
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(ManualExecutor::new());
    let s = RequestScheduler::new(
        recorder.config(Thresholds::default()),
        SqliteCounterStore::open_memory().unwrap(),
        recorder.host("1", executor.clone()),
    )
    .unwrap();

    s.request_evaluation(RequestDelay::After(Duration::from_secs(1))).unwrap();
    executor.advance(Duration::from_secs(1));
    executor.advance(Duration::from_secs(1));

    assert_eq!(recorder.decisions(), 1);
    assert_eq!(recorder.prompts(), 1);
    assert_eq!(s.pending_state(), PendingState::Fired);

    // Fired is terminal: cancelling now does nothing
    assert!(!s.cancel_pending());
}

#[test]
fn test_post_prompt_reset_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.db");
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(ManualExecutor::new());

    {
        let s = RequestScheduler::new(
            recorder.config(Thresholds::new(0, 2, 0)),
            SqliteCounterStore::open_at(&path).unwrap(),
            recorder.host("9", executor.clone()),
        )
        .unwrap();
        s.record_session().unwrap();
        s.record_session().unwrap();
        s.request_evaluation(RequestDelay::Immediate).unwrap();
    }

    let store = SqliteCounterStore::open_at(&path).unwrap();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.app_sessions_count, 0);
    assert!(snapshot.first_open_date.is_none());
    assert_eq!(snapshot.last_version_prompted_for_rating.as_deref(), Some("9"));

    let seen = recorder.decisions.lock().unwrap()[0].clone();
    assert_eq!(seen.app_sessions_count, 2);
}

#[tokio::test]
async fn test_tokio_deferred_request_fires_after_delay() {
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(TokioExecutor::current().unwrap());
    let s = RequestScheduler::new(
        recorder.config(Thresholds::default()),
        SqliteCounterStore::open_memory().unwrap(),
        recorder.host("1", executor),
    )
    .unwrap();

    s.request_evaluation(RequestDelay::After(Duration::from_secs(1))).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recorder.decisions(), 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(recorder.decisions(), 1);
    assert_eq!(recorder.prompts(), 1);
}

#[tokio::test]
async fn test_tokio_cancelled_request_never_fires() {
    let recorder = Arc::new(Recorder::default());
    let executor = Arc::new(TokioExecutor::current().unwrap());
    let s = RequestScheduler::new(
        recorder.config(Thresholds::default()),
        SqliteCounterStore::open_memory().unwrap(),
        recorder.host("1", executor),
    )
    .unwrap();

    s.request_evaluation(RequestDelay::After(Duration::from_millis(200))).unwrap();
    s.cancel_pending();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(recorder.decisions(), 0);
    assert_eq!(s.pending_state(), PendingState::Cancelled);
}
