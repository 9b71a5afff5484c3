// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! End-to-end scenarios S1-S6 (`spec.md` §8 "TESTABLE PROPERTIES"), exercised
//! against the full stack (registry, barrier, pool, registrations, dispatch)
//! without a real HTTP transport — `SPEC_FULL.md` §6 notes the workspace is
//! testable this way, since `fns-dispatch` already speaks in terms of
//! `CodeError::http_status()` rather than anything HTTP-specific.

use fns_cluster::{Registration, RegistrationsManager};
use fns_core::{Argument, ClosureFn, CodeError, ErrorKind, FnHandler, NoRuntime, RequestContext, Service};
use fns_dispatch::{Dispatcher, NoRemoteCaller, Outcome, RemoteCaller};
use fns_pool::{PoolConfig, WorkerPool};
use fns_registry::ServiceRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn ctx(request_id: &str) -> RequestContext {
    RequestContext::new(request_id, Arc::new(NoRuntime))
}

fn dispatcher(max_workers: usize, remote: Arc<dyn RemoteCaller>) -> Dispatcher {
    Dispatcher::new(
        Arc::new(ServiceRegistry::new("node-1")),
        Arc::new(RegistrationsManager::new()),
        WorkerPool::new(PoolConfig::with_defaults().max_workers(max_workers)),
        remote,
    )
}

/// S1: a local happy path. Mount `echo.ping`, call it, expect a 200-shaped
/// outcome and the caller's own request id reflected back unchanged (the
/// id a transport would copy into an `X-Fns-Request-Id` response header).
#[tokio::test]
async fn s1_local_happy_path() {
    let dispatcher = dispatcher(4, Arc::new(NoRemoteCaller));
    let handler: Arc<dyn FnHandler> =
        Arc::new(ClosureFn::new(|_ctx, _arg| async { Ok(serde_json::json!({"pong": true})) }));
    dispatcher
        .registry()
        .mount(Service::builder("echo").with_fn("ping", handler).build().unwrap())
        .unwrap();

    let request_id = "req-s1";
    let request_ctx = ctx(request_id);
    let result = dispatcher.request(&request_ctx, "echo", "ping", Argument::empty()).await;

    assert_eq!(result.outcome.unwrap(), serde_json::json!({"pong": true}));
    assert_eq!(request_ctx.id, request_id);
}

/// S2: an unmounted service is a 404-shaped `not-found`, never a panic or a
/// bare `Err` the caller can't classify.
#[tokio::test]
async fn s2_unknown_service_is_not_found() {
    let dispatcher = dispatcher(4, Arc::new(NoRemoteCaller));
    let result = dispatcher.request(&ctx("req-s2"), "billing", "charge", Argument::empty()).await;
    let err = result.outcome.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.kind.http_status(), 404);
}

/// S3: 50 concurrent requests with an identical body and authorization
/// coalesce onto a single handler invocation (`spec.md` §4.1 single-flight),
/// yet every caller still observes the shared result.
#[tokio::test]
async fn s3_barrier_coalesces_fifty_identical_calls() {
    let dispatcher = Arc::new(dispatcher(64, Arc::new(NoRemoteCaller)));
    let invocations = Arc::new(AtomicUsize::new(0));

    let counter = invocations.clone();
    let handler: Arc<dyn FnHandler> = Arc::new(ClosureFn::new(move |_ctx, _arg| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(serde_json::json!({"n": 1}))
        }
    }));
    dispatcher
        .registry()
        .mount(Service::builder("slow").with_fn("compute", handler).build().unwrap())
        .unwrap();

    let mut handles = Vec::with_capacity(50);
    for i in 0..50 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .request(
                    &ctx(&format!("req-s3-{i}")),
                    "slow",
                    "compute",
                    Argument::from(serde_json::json!({"x": 1})),
                )
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.outcome.unwrap(), serde_json::json!({"n": 1}));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

/// S4: with `maxWorkers=2` and a handler parked on a gate, the third
/// concurrent (non-identical) request is refused as `not-acceptable` rather
/// than queued.
#[tokio::test]
async fn s4_worker_saturation_refuses_the_third_call() {
    let dispatcher = Arc::new(dispatcher(2, Arc::new(NoRemoteCaller)));
    let gate = Arc::new(tokio::sync::Notify::new());
    let gate_for_handler = gate.clone();
    let handler: Arc<dyn FnHandler> = Arc::new(ClosureFn::new(move |_ctx, _arg| {
        let gate = gate_for_handler.clone();
        async move {
            gate.notified().await;
            Ok(serde_json::json!(null))
        }
    }));
    dispatcher
        .registry()
        .mount(Service::builder("gated").with_fn("wait", handler).build().unwrap())
        .unwrap();

    let d1 = dispatcher.clone();
    let d2 = dispatcher.clone();
    let h1 = tokio::spawn(async move {
        d1.request(&ctx("req-s4-1"), "gated", "wait", Argument::from(serde_json::json!({"one": true})))
            .await
    });
    let h2 = tokio::spawn(async move {
        d2.request(&ctx("req-s4-2"), "gated", "wait", Argument::from(serde_json::json!({"two": true})))
            .await
    });
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let third = dispatcher
        .request(&ctx("req-s4-3"), "gated", "wait", Argument::from(serde_json::json!({"three": true})))
        .await;
    let err = third.outcome.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAcceptable);
    assert_eq!(err.kind.http_status(), 406);

    gate.notify_waiters();
    assert!(h1.await.unwrap().outcome.is_ok());
    assert!(h2.await.unwrap().outcome.is_ok());
}

/// S5: two registrations for `remote.svc`. R1 fails every call; after three
/// failures it is marked suspected-unavailable and dropped from subsequent
/// round-robin iteration, leaving only R2 in rotation.
#[tokio::test]
async fn s5_failover_drops_r1_after_three_failures() {
    struct R1AlwaysFails;
    #[async_trait::async_trait]
    impl RemoteCaller for R1AlwaysFails {
        async fn call(
            &self,
            _ctx: &RequestContext,
            registration: &Registration,
            _fn_name: &str,
            _argument: Argument,
        ) -> Outcome {
            if registration.address() == "r1" {
                Err(CodeError::unavailable("r1 down"))
            } else {
                Ok(serde_json::json!({"from": registration.address()}))
            }
        }
    }

    let registrations = Arc::new(RegistrationsManager::new());
    let r1 = Registration::new("remote.svc", "r1", None);
    let r2 = Registration::new("remote.svc", "r2", None);
    registrations.join(r1.clone());
    registrations.join(r2.clone());

    let dispatcher = Dispatcher::new(
        Arc::new(ServiceRegistry::new("node-1")),
        registrations.clone(),
        WorkerPool::new(PoolConfig::with_defaults().max_workers(4)),
        Arc::new(R1AlwaysFails),
    );

    // Every call fails over from r1 to r2 within the same request, so every
    // one of the three iterations still succeeds from the caller's view.
    for i in 0..3 {
        let internal_ctx = ctx(&format!("req-s5-{i}")).with_internal_access();
        let result = dispatcher.request(&internal_ctx, "remote.svc", "fn", Argument::empty()).await;
        assert_eq!(result.outcome.unwrap(), serde_json::json!({"from": "r2"}));
    }

    assert!(r1.failure_count() >= 3);
    assert!(r1.is_suspected_unavailable());

    let remaining = registrations.snapshot("remote.svc");
    let healthy: Vec<_> = remaining.iter().filter(|r| !r.is_suspected_unavailable()).collect();
    assert_eq!(healthy.len(), 1);
    assert_eq!(healthy[0].address(), "r2");
}

/// S6: a handler that sleeps 1s against a 100ms deadline resolves as
/// `timeout` well before the handler itself finishes, and the worker slot
/// it occupied returns to the pool once the handler eventually completes in
/// the background rather than being leaked.
#[tokio::test(start_paused = true)]
async fn s6_timeout_recovers_the_pool_slot() {
    let pool = WorkerPool::new(PoolConfig::with_defaults().max_workers(4));
    let dispatcher = dispatcher_with_pool(pool.clone());
    let handler: Arc<dyn FnHandler> = Arc::new(ClosureFn::new(|_ctx, _arg| async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(serde_json::json!(null))
    }));
    dispatcher
        .registry()
        .mount(Service::builder("slow").with_fn("sleep", handler).build().unwrap())
        .unwrap();

    let baseline = pool.slot_count();
    let deadline_ctx = ctx("req-s6").with_deadline(std::time::Instant::now() + Duration::from_millis(100));

    let call = dispatcher.request(&deadline_ctx, "slow", "sleep", Argument::empty());
    tokio::pin!(call);
    tokio::select! {
        result = &mut call => {
            assert_eq!(result.outcome.unwrap_err().kind, ErrorKind::Timeout);
        }
        _ = tokio::time::sleep(Duration::from_millis(150)) => {
            panic!("request did not resolve with a timeout within 150ms of issuance");
        }
    }
    assert_eq!(pool.slot_count(), baseline + 1, "slot claimed for the in-flight handler");

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(pool.slot_count(), baseline, "slot released once the handler actually finished");
}

fn dispatcher_with_pool(pool: WorkerPool) -> Dispatcher {
    Dispatcher::new(
        Arc::new(ServiceRegistry::new("node-1")),
        Arc::new(RegistrationsManager::new()),
        pool,
        Arc::new(NoRemoteCaller),
    )
}
