use super::*;
use fns_core::FakeClock;
use std::sync::atomic::{AtomicUsize, Ordering};

fn pool(max_workers: usize) -> WorkerPool<FakeClock> {
    WorkerPool::with_clock(
        PoolConfig::with_defaults()
            .max_workers(max_workers)
            .max_idle_duration(Duration::from_secs(10)),
        FakeClock::new(),
    )
}

#[tokio::test]
async fn submit_refuses_once_saturated() {
    let pool = pool(2);
    let gate = Arc::new(tokio::sync::Notify::new());

    let g1 = gate.clone();
    let sink1 = pool.submit(Box::pin(async move {
        g1.notified().await;
        Ok(serde_json::json!(1))
    }));
    let g2 = gate.clone();
    let sink2 = pool.submit(Box::pin(async move {
        g2.notified().await;
        Ok(serde_json::json!(2))
    }));
    assert!(sink1.is_some());
    assert!(sink2.is_some());

    tokio::task::yield_now().await;
    assert_eq!(pool.slot_count(), 2);

    let sink3 = pool.submit(Box::pin(async { Ok(serde_json::json!(3)) }));
    assert!(sink3.is_none(), "third submission must be refused under saturation");

    gate.notify_waiters();
    assert_eq!(sink1.unwrap().wait().await.unwrap(), serde_json::json!(1));
    assert_eq!(sink2.unwrap().wait().await.unwrap(), serde_json::json!(2));
}

#[tokio::test]
async fn slot_count_never_exceeds_max_workers() {
    let pool = pool(3);
    let mut sinks = Vec::new();
    for i in 0..10 {
        if let Some(sink) = pool.submit(Box::pin(async move { Ok(serde_json::json!(i)) })) {
            sinks.push(sink);
        }
        assert!(pool.slot_count() <= 3);
    }
}

#[tokio::test]
async fn panicking_handler_returns_service_error_and_frees_the_slot() {
    let pool = pool(1);
    let sink = pool.submit(Box::pin(async { panic!("kaboom") })).unwrap();
    let outcome = sink.wait().await;
    assert_eq!(outcome.unwrap_err().kind, fns_core::ErrorKind::ServiceError);

    tokio::task::yield_now().await;
    assert_eq!(pool.slot_count(), 1, "panicking slot returns to the free list, not retired");
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_reaper_evicts_after_max_idle_duration() {
    let clock = FakeClock::new();
    let pool = WorkerPool::with_clock(
        PoolConfig::with_defaults().max_workers(4).max_idle_duration(Duration::from_millis(100)),
        clock.clone(),
    );
    pool.start();

    let sink = pool.submit(Box::pin(async { Ok(serde_json::json!(1)) })).unwrap();
    sink.wait().await;
    tokio::task::yield_now().await;
    assert_eq!(pool.idle_count(), 1);

    clock.advance(Duration::from_millis(200));
    tokio::time::advance(Duration::from_millis(200)).await;
    tokio::task::yield_now().await;

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.slot_count(), 0);
}

#[tokio::test]
async fn sync_waits_for_outstanding_work() {
    let pool = pool(2);
    let done = Arc::new(AtomicUsize::new(0));
    let d = done.clone();
    let gate = Arc::new(tokio::sync::Notify::new());
    let g = gate.clone();
    let _sink = pool.submit(Box::pin(async move {
        g.notified().await;
        d.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!(null))
    }));

    let pool2 = pool.clone();
    let waiter = tokio::spawn(async move { pool2.sync().await });
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    gate.notify_waiters();
    waiter.await.unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_refuses_further_submission() {
    let pool = pool(2);
    pool.stop().await;
    assert!(pool.submit(Box::pin(async { Ok(serde_json::json!(null)) })).is_none());
}
