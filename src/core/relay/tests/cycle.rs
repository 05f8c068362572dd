//! End-to-end cycle behavior against in-memory collaborators.

use async_trait::async_trait;
use std::time::Duration;

use super::{FixedSource, Item, MemoryStore, RecordingDispatcher};
use crate::core::relay::{
    CycleOutcome, CycleSettings, DispatchSummary, Dispatcher, RunController,
};

fn controller<'a>(
    source: &'a FixedSource,
    dispatcher: &'a dyn Dispatcher<Item>,
    store: &'a MemoryStore,
    settings: CycleSettings,
) -> RunController<'a, Item> {
    RunController::new(source, dispatcher, store, settings)
}

fn settings(first_run_limit: usize) -> CycleSettings {
    CycleSettings {
        fetch_limit: 30,
        first_run_limit,
        dispatch_delay: Duration::ZERO,
        dispatch_timeout: Duration::from_secs(5),
        persist: true,
    }
}

#[tokio::test]
async fn first_run_dispatches_latest_three_and_seeds_watermark() {
    let source = FixedSource::new(&[4, 1, 5, 3, 2]);
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::default();

    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert_eq!(dispatcher.attempts(), vec![3, 4, 5]);
    assert_eq!(
        outcome,
        CycleOutcome::Dispatched(DispatchSummary {
            sent: 3,
            attempted: 3,
            skipped: 2,
            watermark: 5,
            total_sent: 3,
        })
    );
    let state = store.current();
    assert_eq!(state.last_seen_id, 5);
    assert_eq!(state.total_sent, 3);
    assert!(state.last_check.is_some());
    assert_eq!(*source.requested_limit.lock().unwrap(), Some(30));
}

#[tokio::test]
async fn repeat_fetch_without_new_reports_dispatches_nothing() {
    let source = FixedSource::new(&[3, 4, 5]);
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::with(5, 11);

    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert!(dispatcher.attempts().is_empty());
    assert_eq!(
        outcome,
        CycleOutcome::NoNewReports {
            fetched: 3,
            watermark: 5
        }
    );
    let state = store.current();
    assert_eq!(state.last_seen_id, 5);
    assert_eq!(state.total_sent, 11);
    assert!(state.last_check.is_some());
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn failed_delivery_is_counted_out_and_never_retried() {
    let dispatcher = RecordingDispatcher::failing_on(&[6]);
    let store = MemoryStore::with(5, 2);

    let source = FixedSource::new(&[7, 6]);
    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert_eq!(dispatcher.attempts(), vec![6, 7]);
    assert_eq!(
        outcome,
        CycleOutcome::Dispatched(DispatchSummary {
            sent: 1,
            attempted: 2,
            skipped: 0,
            watermark: 7,
            total_sent: 3,
        })
    );
    assert_eq!(store.current().last_seen_id, 7);
    assert_eq!(store.current().total_sent, 3);

    // Next tick sees the same reports plus a newer one: only 8 goes out.
    let source = FixedSource::new(&[6, 7, 8]);
    controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();
    assert_eq!(dispatcher.attempts(), vec![6, 7, 8]);
    assert_eq!(store.current().last_seen_id, 8);
    assert_eq!(store.current().total_sent, 4);
}

#[tokio::test]
async fn all_deliveries_failing_still_advances_watermark() {
    let source = FixedSource::new(&[10, 11]);
    let dispatcher = RecordingDispatcher::failing_on(&[10, 11]);
    let store = MemoryStore::with(9, 4);

    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Dispatched(summary) => {
            assert_eq!(summary.sent, 0);
            assert_eq!(summary.attempted, 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.current().last_seen_id, 11);
    assert_eq!(store.current().total_sent, 4);
}

#[tokio::test]
async fn fetch_error_leaves_state_untouched() {
    let source = FixedSource::failing();
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::with(5, 9);

    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::FetchFailed);
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.current().last_seen_id, 5);
    assert_eq!(store.current().total_sent, 9);
    assert!(dispatcher.attempts().is_empty());
}

#[tokio::test]
async fn empty_batch_is_treated_as_fetch_failure() {
    let source = FixedSource::new(&[]);
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::default();

    let outcome = controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::FetchFailed);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn steady_state_sends_everything_new_in_order() {
    let source = FixedSource::new(&[25, 21, 24, 22, 23, 20]);
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::with(20, 0);

    controller(&source, &dispatcher, &store, settings(3))
        .run_once()
        .await
        .unwrap();

    assert_eq!(dispatcher.attempts(), vec![21, 22, 23, 24, 25]);
    assert_eq!(store.current().total_sent, 5);
}

#[tokio::test]
async fn dry_run_dispatches_but_never_persists() {
    let source = FixedSource::new(&[1, 2]);
    let dispatcher = RecordingDispatcher::default();
    let store = MemoryStore::default();
    let mut dry = settings(3);
    dry.persist = false;

    controller(&source, &dispatcher, &store, dry)
        .run_once()
        .await
        .unwrap();

    assert_eq!(dispatcher.attempts(), vec![1, 2]);
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.current().last_seen_id, 0);
}

struct StalledDispatcher;

#[async_trait]
impl Dispatcher<Item> for StalledDispatcher {
    async fn send(&self, item: &Item) -> bool {
        if item.0 == 2 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        true
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_dispatch_counts_as_failure() {
    let source = FixedSource::new(&[1, 2, 3]);
    let store = MemoryStore::with(0, 0);
    let mut cfg = settings(10);
    cfg.dispatch_timeout = Duration::from_secs(30);

    let outcome = controller(&source, &StalledDispatcher, &store, cfg)
        .run_once()
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Dispatched(summary) => {
            assert_eq!(summary.sent, 2);
            assert_eq!(summary.watermark, 3);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn fixed_delay_separates_dispatch_attempts() {
    let source = FixedSource::new(&[1, 2, 3]);
    let dispatcher = RecordingDispatcher::failing_on(&[2]);
    let store = MemoryStore::with(0, 0);
    let mut cfg = settings(10);
    cfg.dispatch_delay = Duration::from_millis(1500);

    let started = tokio::time::Instant::now();
    controller(&source, &dispatcher, &store, cfg)
        .run_once()
        .await
        .unwrap();

    // Two gaps for three items, regardless of the failure in the middle.
    assert_eq!(started.elapsed(), Duration::from_millis(3000));
}
