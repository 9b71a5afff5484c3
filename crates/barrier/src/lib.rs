// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Single-flight request coalescing, keyed by fingerprint (`spec.md` §4.1).
//!
//! At most one execution of a thunk is in flight per key at any moment.
//! Concurrent callers attach to the in-flight entry and all observe the same
//! outcome, broadcast atomically on resolution.

use fns_core::{from_panic, CodeError, RequestContext};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Notify;

/// Either the thunk's value or its classified error — never both, never
/// partially observed (`spec.md` §8 property 2).
pub type Outcome = Result<serde_json::Value, CodeError>;

struct Entry {
    result: Mutex<Option<Outcome>>,
    notify: Notify,
}

impl Entry {
    fn new() -> Self {
        Self { result: Mutex::new(None), notify: Notify::new() }
    }
}

/// Single-flight coalescer. Keyed by any `Eq + Hash + Clone` type — the
/// dispatcher uses [`fns_core::Fingerprint`]; other callers may use a plain
/// `String`.
pub struct Barrier<K: Eq + Hash + Clone + Send + Sync + 'static> {
    in_flight: Mutex<HashMap<K, Arc<Entry>>>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Default for Barrier<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Barrier<K> {
    pub fn new() -> Self {
        Self { in_flight: Mutex::new(HashMap::new()) }
    }

    /// Run `thunk` exactly once per `key` among concurrent callers. Returns
    /// `(outcome, shared)` where `shared` is true iff this caller attached to
    /// an already-running execution rather than becoming its leader.
    ///
    /// `ctx` bounds only the *waiting* caller: if its deadline elapses before
    /// the leader resolves, this call returns a `timeout` error while the
    /// thunk keeps running to completion for the leader and any other
    /// waiters (`spec.md` §4.1 "the context is used only for cancellation of
    /// the waiting caller, not of the thunk").
    pub async fn run<F>(&self, ctx: &RequestContext, key: K, thunk: F) -> (Outcome, bool)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let (entry, is_leader) = {
            let mut table = self.in_flight.lock();
            if let Some(existing) = table.get(&key) {
                (existing.clone(), false)
            } else {
                let entry = Arc::new(Entry::new());
                table.insert(key.clone(), entry.clone());
                (entry, true)
            }
        };

        if is_leader {
            let outcome = run_guarded(thunk).await;
            *entry.result.lock() = Some(outcome.clone());
            entry.notify.notify_waiters();
            self.in_flight.lock().remove(&key);
            return (outcome, false);
        }

        let outcome = self.wait_for(ctx, &entry).await;
        (outcome, true)
    }

    async fn wait_for(&self, ctx: &RequestContext, entry: &Entry) -> Outcome {
        loop {
            // Register for notification *before* checking the result: `Notify`
            // captures the current notification sequence at creation time, so a
            // `notify_waiters()` racing between this check and the next await is
            // still observed. Checking first and creating `notified` after would
            // leave a window where a resolution between the two is missed forever.
            let notified = entry.notify.notified();
            if let Some(outcome) = entry.result.lock().clone() {
                return outcome;
            }
            match ctx.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(instant_to_tokio(deadline)) => {
                            return Err(CodeError::timeout("barrier wait deadline elapsed"));
                        }
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Explicitly drop any in-flight entry for `key` so the next `run` call
    /// starts a fresh execution rather than attaching to this one
    /// (`spec.md` §4.1).
    pub fn forget(&self, _ctx: &RequestContext, key: &K) {
        self.in_flight.lock().remove(key);
    }

    /// Number of distinct keys currently in flight. Test/metrics helper.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

fn instant_to_tokio(instant: std::time::Instant) -> tokio::time::Instant {
    tokio::time::Instant::from_std(instant)
}

/// Runs `thunk` under an unwind boundary, converting a panic into a
/// `service-error`-kind [`CodeError`] (`spec.md` §4.1 "Failure semantics").
async fn run_guarded<F>(thunk: F) -> Outcome
where
    F: Future<Output = Outcome> + Send + 'static,
{
    match std::panic::AssertUnwindSafe(thunk).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(from_panic(payload)),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
