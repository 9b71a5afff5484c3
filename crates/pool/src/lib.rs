// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Bounded worker pool with idle-time reclamation (`spec.md` §4.2).
//!
//! The pool is the system's admission control for local compute: submission
//! never blocks, and refusal is the only form of backpressure. A handler
//! panic is caught and converted to an error on the work item's result
//! sink; the slot that ran it returns to the free list rather than being
//! retired (only the idle reaper retires slots, and only after a full idle
//! window).

use fns_core::{from_panic, CodeError, Clock, SlotId, SystemClock};
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};

pub type Outcome = Result<serde_json::Value, CodeError>;
pub type BoxedJob = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// Pool configuration (`spec.md` §4.2).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_workers: usize,
    pub max_idle_duration: Duration,
}

impl PoolConfig {
    /// `maxWorkers` defaults to CPU-count × 32K; `maxIdleDuration` to 10s
    /// (`spec.md` §4.2). Values below the spec's floors are clamped up
    /// rather than rejected, since a misconfigured pool should still run.
    pub fn with_defaults() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { max_workers: cpus.saturating_mul(32_000), max_idle_duration: Duration::from_secs(10) }
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = n.max(1);
        self
    }

    pub fn max_idle_duration(mut self, d: Duration) -> Self {
        self.max_idle_duration = d.max(Duration::from_secs(1));
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A single-write completion slot for one work item's outcome (`spec.md`
/// §3 "Result sink").
pub struct ResultSink(oneshot::Receiver<Outcome>);

impl ResultSink {
    pub async fn wait(self) -> Outcome {
        match self.0.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CodeError::service_error("worker slot dropped without resolving")),
        }
    }
}

#[derive(Clone, Copy)]
struct IdleSlot {
    id: SlotId,
    last_used: Instant,
}

struct Inner<C: Clock> {
    config: PoolConfig,
    clock: C,
    /// Idle slots, sorted ascending by `last_used`. Submission pops from the
    /// back (hottest slot, LIFO reuse); the reaper trims from the front.
    free: Mutex<Vec<IdleSlot>>,
    active: AtomicUsize,
    outstanding: AtomicUsize,
    drain_notify: Notify,
    stopped: AtomicBool,
}

/// Bounded set of reusable worker slots. Cloneable — every clone shares the
/// same pool state.
#[derive(Clone)]
pub struct WorkerPool<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl WorkerPool<SystemClock> {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> WorkerPool<C> {
    pub fn with_clock(config: PoolConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                free: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                drain_notify: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Launches the idle-reaper background task. Idempotent to call once at
    /// boot; calling it twice spawns a second reaper, which is harmless but
    /// wasteful — callers should call it exactly once.
    pub fn start(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.config.max_idle_duration).await;
                if inner.stopped.load(Ordering::SeqCst) {
                    break;
                }
                reap(&inner);
            }
        });
    }

    /// Attempts to claim a ready slot, spawning a new one if below
    /// `max_workers`; otherwise refuses. Never blocks (`spec.md` §4.2).
    pub fn submit(&self, job: BoxedJob) -> Option<ResultSink> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return None;
        }

        let slot_id = {
            let mut free = self.inner.free.lock();
            if let Some(slot) = free.pop() {
                slot.id
            } else {
                drop(free);
                let active = self.inner.active.fetch_add(1, Ordering::SeqCst);
                if active >= self.inner.config.max_workers {
                    self.inner.active.fetch_sub(1, Ordering::SeqCst);
                    return None;
                }
                SlotId::new()
            }
        };

        let (tx, rx) = oneshot::channel();
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = match std::panic::AssertUnwindSafe(job).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(from_panic(payload)),
            };
            let _ = tx.send(outcome);

            if inner.stopped.load(Ordering::SeqCst) {
                inner.active.fetch_sub(1, Ordering::SeqCst);
            } else {
                inner
                    .free
                    .lock()
                    .push(IdleSlot { id: slot_id, last_used: inner.clock.now() });
            }
            inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            inner.drain_notify.notify_waiters();
        });

        Some(ResultSink(rx))
    }

    /// Blocks until every outstanding work item has resolved (`spec.md`
    /// §4.2 "used during shutdown").
    pub async fn sync(&self) {
        loop {
            // Same ordering requirement as `fns_barrier::Barrier::wait_for`:
            // register for notification before checking the drain condition,
            // or a resolution racing between the check and the await is lost.
            let notified = self.inner.drain_notify.notified();
            if self.inner.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the pool to further submission, retires all idle slots, and
    /// waits for in-flight work to drain (`spec.md` §4.2).
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let retired = {
            let mut free = self.inner.free.lock();
            let n = free.len();
            free.clear();
            n
        };
        self.inner.active.fetch_sub(retired, Ordering::SeqCst);
        self.sync().await;
    }

    /// Number of slots that currently exist (idle + running). Test helper
    /// mirroring `spec.md` §8 property 3 ("never exceeds maxWorkers").
    pub fn slot_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn max_workers(&self) -> usize {
        self.inner.config.max_workers
    }
}

/// Evicts slots idle for at least `max_idle_duration`. The free list is kept
/// sorted ascending by `last_used`, so the cutoff is a single binary search
/// rather than a linear scan (`spec.md` §4.2).
fn reap<C: Clock>(inner: &Inner<C>) {
    let mut free = inner.free.lock();
    free.sort_by_key(|slot| slot.last_used);
    let cutoff = inner.clock.now().checked_sub(inner.config.max_idle_duration);
    let Some(cutoff) = cutoff else { return };
    let split = free.partition_point(|slot| slot.last_used < cutoff);
    let retired = split;
    free.drain(..split);
    drop(free);
    if retired > 0 {
        inner.active.fetch_sub(retired, Ordering::SeqCst);
        tracing::debug!(retired, "idle reaper retired slots");
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
