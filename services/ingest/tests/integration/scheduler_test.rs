use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio_util::sync::CancellationToken;

use inlet_core::clock::Clock;
use inlet_ingest::domain::repository::EventStore;
use inlet_ingest::domain::types::{EventStatus, LeaseClaim, Settlement};
use inlet_ingest::worker::handler::TracingEventHandler;
use inlet_ingest::worker::scheduler::{PassReport, Scheduler, SchedulerConfig};

use crate::helpers::{
    LeaseStealingHandler, MemoryEventStore, ScriptedHandler, SelectiveHandler, SlowReloadStore,
    StallingHandler, TokioClock, received_event, scheduler, scheduler_with, test_clock,
};

// ── Success and retry ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_process_received_event() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let handler = Arc::new(ScriptedHandler::failing(0));

    let report = scheduler(&store, handler.clone(), &clock)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(
        report,
        PassReport {
            claimed: 1,
            processed: 1,
            ..PassReport::default()
        }
    );
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Processed);
    assert_eq!(event.processed_at, Some(clock.now()));
    assert_eq!(event.last_attempt_at, Some(clock.now()));
    assert_eq!(event.attempts, 0);
    assert!(event.lock_id.is_none() && event.locked_until.is_none());
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn should_count_failures_not_calls_when_retry_succeeds() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let handler = Arc::new(ScriptedHandler::failing(1));
    let scheduler = scheduler(&store, handler.clone(), &clock);

    let first = scheduler.run_pass().await.unwrap();
    assert_eq!(first.retried, 1);
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Received);
    assert_eq!(event.attempts, 1);
    assert_eq!(event.last_error.as_deref(), Some("call 1: downstream rejected"));

    clock.advance(Duration::seconds(5));
    let second = scheduler.run_pass().await.unwrap();
    assert_eq!(second.processed, 1);

    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Processed);
    assert_eq!(event.attempts, 1);
    assert!(event.last_error.is_none());
    assert!(event.next_attempt_at.is_none());
    assert_eq!(handler.calls(), 2);
}

#[tokio::test]
async fn should_not_reclaim_before_backoff_elapses() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let scheduler = scheduler(&store, Arc::new(ScriptedHandler::always_failing()), &clock);

    scheduler.run_pass().await.unwrap();
    assert_eq!(
        store.get(id).next_attempt_at,
        Some(clock.now() + Duration::seconds(5))
    );

    clock.advance(Duration::seconds(4));
    assert_eq!(scheduler.run_pass().await.unwrap().claimed, 0);

    clock.advance(Duration::seconds(1));
    assert_eq!(scheduler.run_pass().await.unwrap().claimed, 1);
    assert_eq!(
        store.get(id).next_attempt_at,
        Some(clock.now() + Duration::seconds(15))
    );
}

// ── Dead-lettering ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_dead_letter_after_max_attempts() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let handler = Arc::new(ScriptedHandler::always_failing());
    let scheduler = scheduler(&store, handler.clone(), &clock);

    for _ in 0..5 {
        let report = scheduler.run_pass().await.unwrap();
        assert_eq!(report.claimed, 1);
        clock.advance(Duration::seconds(300));
    }

    let event = store.get(id);
    assert_eq!(event.status, EventStatus::DeadLettered);
    assert_eq!(event.attempts, 5);
    assert_eq!(event.last_error.as_deref(), Some("call 5: downstream rejected"));
    assert!(event.next_attempt_at.is_none());
    assert!(event.lock_id.is_none() && event.locked_until.is_none());

    clock.advance(Duration::days(30));
    assert_eq!(scheduler.run_pass().await.unwrap().claimed, 0);
    assert_eq!(handler.calls(), 5);
}

#[tokio::test]
async fn should_honor_configured_max_attempts() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let config = SchedulerConfig {
        max_attempts: 1,
        ..SchedulerConfig::default()
    };
    let scheduler = scheduler_with(
        &store,
        Arc::new(ScriptedHandler::always_failing()),
        &clock,
        config,
    );

    let report = scheduler.run_pass().await.unwrap();
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(store.get(id).status, EventStatus::DeadLettered);
}

#[tokio::test(start_paused = true)]
async fn should_treat_handler_timeout_as_failure() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));

    let report = scheduler(&store, Arc::new(StallingHandler), &clock)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.retried, 1);
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Received);
    assert_eq!(event.attempts, 1);
    assert_eq!(
        event.last_error.as_deref(),
        Some("handler timed out after 27s")
    );
}

#[tokio::test(start_paused = true)]
async fn should_settle_stuck_handler_before_lease_expires_despite_slow_reload() {
    let clock = TokioClock::new();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));

    let stuck = Scheduler::new(
        Arc::new(SlowReloadStore {
            inner: store.clone(),
            delay: StdDuration::from_secs(1),
        }),
        Arc::new(StallingHandler),
        Arc::new(clock.clone()),
        SchedulerConfig::default(),
        CancellationToken::new(),
    );
    let rival = Scheduler::new(
        Arc::new(store.clone()),
        Arc::new(TracingEventHandler),
        Arc::new(clock.clone()),
        SchedulerConfig::default(),
        CancellationToken::new(),
    );

    // The rival polls just after the 30s lease would have run out
    let (stuck_report, rival_report) = tokio::join!(stuck.run_pass(), async {
        tokio::time::sleep(StdDuration::from_millis(30_500)).await;
        rival.run_pass().await
    });
    let (stuck_report, rival_report) = (stuck_report.unwrap(), rival_report.unwrap());

    assert_eq!(stuck_report.claimed, 1);
    assert_eq!(stuck_report.retried, 1);
    assert_eq!(stuck_report.lost, 0);
    assert_eq!(rival_report.claimed, 0);
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Received);
    assert_eq!(event.attempts, 1);
    assert_eq!(
        event.last_error.as_deref(),
        Some("handler timed out after 26s")
    );
    assert!(event.lock_id.is_none() && event.locked_until.is_none());
}

#[tokio::test(start_paused = true)]
async fn should_skip_handler_when_lease_is_spent_before_it_runs() {
    let clock = TokioClock::new();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let handler = Arc::new(ScriptedHandler::failing(0));

    let report = Scheduler::new(
        Arc::new(SlowReloadStore {
            inner: store.clone(),
            delay: StdDuration::from_secs(28),
        }),
        handler.clone(),
        Arc::new(clock.clone()),
        SchedulerConfig::default(),
        CancellationToken::new(),
    )
    .run_pass()
    .await
    .unwrap();

    assert_eq!(report.claimed, 1);
    assert_eq!(report.lost, 1);
    assert_eq!(handler.calls(), 0);
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Processing);
    assert_eq!(event.attempts, 0);
    assert!(event.lock_id.is_some());
}

// ── Claiming ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_claim_oldest_first_up_to_batch_size() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let t0 = clock.now();
    let newest = store.seed(received_event("evt_c", t0 + Duration::seconds(2)));
    let oldest = store.seed(received_event("evt_a", t0));
    let middle = store.seed(received_event("evt_b", t0 + Duration::seconds(1)));
    clock.advance(Duration::seconds(3));
    let config = SchedulerConfig {
        batch_size: 2,
        ..SchedulerConfig::default()
    };

    let report = scheduler_with(&store, Arc::new(TracingEventHandler), &clock, config)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.claimed, 2);
    assert_eq!(store.get(oldest).status, EventStatus::Processed);
    assert_eq!(store.get(middle).status, EventStatus::Processed);
    assert_eq!(store.get(newest).status, EventStatus::Received);
}

#[tokio::test]
async fn should_never_claim_failed_rows() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let mut rejected = received_event("evt_1", clock.now());
    rejected.status = EventStatus::Failed;
    rejected.last_error = Some("signature mismatch".to_owned());
    store.seed(rejected);
    clock.advance(Duration::days(1));

    let report = scheduler(&store, Arc::new(TracingEventHandler), &clock)
        .run_pass()
        .await
        .unwrap();
    assert_eq!(report.claimed, 0);
}

#[tokio::test]
async fn should_isolate_failures_within_a_batch() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let good = store.seed(received_event("evt_good", clock.now()));
    let bad = store.seed(received_event("evt_bad", clock.now()));
    let handler = Arc::new(SelectiveHandler {
        failing_ids: HashSet::from(["evt_bad".to_owned()]),
    });

    let report = scheduler(&store, handler, &clock)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.claimed, 2);
    assert_eq!(report.processed, 1);
    assert_eq!(report.retried, 1);
    assert_eq!(store.get(good).status, EventStatus::Processed);
    let bad = store.get(bad);
    assert_eq!(bad.status, EventStatus::Received);
    assert_eq!(bad.last_error.as_deref(), Some("cannot process evt_bad"));
}

#[tokio::test]
async fn should_process_each_event_once_across_concurrent_schedulers() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    for i in 0..10 {
        store.seed(received_event(&format!("evt_{i}"), clock.now()));
    }
    let handler = Arc::new(ScriptedHandler::failing(0));
    let a = scheduler(&store, handler.clone(), &clock);
    let b = scheduler(&store, handler.clone(), &clock);

    let (ra, rb) = tokio::join!(a.run_pass(), b.run_pass());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.claimed + rb.claimed, 10);
    assert_eq!(ra.processed + rb.processed, 10);
    assert_eq!(handler.calls(), 10);
    assert!(
        store
            .all()
            .iter()
            .all(|e| e.status == EventStatus::Processed)
    );
}

// ── Leases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reclaim_expired_lease_and_ignore_stale_holder() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));

    // A scheduler that dies after claiming
    let stale = LeaseClaim {
        now: clock.now(),
        lease_until: clock.now() + Duration::seconds(30),
        lock_id: "dead-scheduler".to_owned(),
        limit: 20,
    };
    assert_eq!(store.claim_batch(&stale).await.unwrap().len(), 1);

    let scheduler = scheduler(&store, Arc::new(TracingEventHandler), &clock);
    clock.advance(Duration::seconds(29));
    assert_eq!(scheduler.run_pass().await.unwrap().claimed, 0);

    clock.advance(Duration::seconds(1));
    let report = scheduler.run_pass().await.unwrap();
    assert_eq!(report.processed, 1);
    let processed = store.get(id);
    assert_eq!(processed.status, EventStatus::Processed);
    assert_eq!(processed.attempts, 0);

    // The stale holder's late completion changes nothing
    let late = Settlement::Retry {
        attempted_at: clock.now(),
        attempts: 1,
        error: "late".to_owned(),
        next_attempt_at: clock.now() + Duration::seconds(5),
    };
    assert!(!store.settle(id, "dead-scheduler", &late).await.unwrap());
    assert_eq!(store.get(id), processed);
}

#[tokio::test]
async fn should_abandon_event_when_lease_is_lost_mid_processing() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    let handler = Arc::new(LeaseStealingHandler {
        store: store.clone(),
    });

    let report = scheduler(&store, handler, &clock)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.claimed, 1);
    assert_eq!(report.lost, 1);
    let event = store.get(id);
    assert_eq!(event.status, EventStatus::Processing);
    assert_eq!(event.lock_id.as_deref(), Some("other-scheduler"));
    assert!(event.processed_at.is_none());
}

// ── Infrastructure failures and shutdown ─────────────────────────────────────

#[tokio::test]
async fn should_surface_claim_failure_from_single_pass() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    store.seed(received_event("evt_1", clock.now()));
    store.set_unavailable(true);

    let result = scheduler(&store, Arc::new(TracingEventHandler), &clock)
        .run_pass()
        .await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn should_keep_polling_after_claim_failure() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    let id = store.seed(received_event("evt_1", clock.now()));
    store.set_unavailable(true);

    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(
        Arc::new(store.clone()),
        Arc::new(TracingEventHandler),
        Arc::new(clock.clone()),
        SchedulerConfig::default(),
        cancel.clone(),
    );
    let task = tokio::spawn(async move { scheduler.run().await });

    tokio::time::sleep(StdDuration::from_secs(5)).await;
    assert!(store.claim_calls.load(Ordering::SeqCst) >= 2);
    assert!(!task.is_finished());

    store.set_unavailable(false);
    tokio::time::sleep(StdDuration::from_secs(3)).await;
    assert_eq!(store.get(id).status, EventStatus::Processed);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn should_return_immediately_when_already_cancelled() {
    let clock = test_clock();
    let store = MemoryEventStore::new();
    store.seed(received_event("evt_1", clock.now()));

    let cancel = CancellationToken::new();
    cancel.cancel();
    Scheduler::new(
        Arc::new(store.clone()),
        Arc::new(TracingEventHandler),
        Arc::new(clock.clone()),
        SchedulerConfig::default(),
        cancel,
    )
    .run()
    .await;

    assert_eq!(store.claim_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.all()[0].status, EventStatus::Received);
}
