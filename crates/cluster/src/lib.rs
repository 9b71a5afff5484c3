// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Registrations manager: tracks remote peers' exported services, offers
//! round-robin selection with health eviction, and notifies the dispatcher
//! when a registration is dropped (`spec.md` §4.4).

use fns_core::RegistrationId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Client TLS material for a remote registration, opaque to the core beyond
/// "hand it to the transport".
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub client_cert: Vec<u8>,
    pub client_key: Vec<u8>,
}

struct RegistrationState {
    id: RegistrationId,
    service: String,
    address: String,
    tls: Option<TlsMaterial>,
    failure_count: AtomicU32,
    suspected_unavailable: AtomicBool,
}

/// A cheaply-cloneable handle to one remote registration (`spec.md` §3).
#[derive(Clone)]
pub struct Registration(Arc<RegistrationState>);

impl Registration {
    pub fn new(service: impl Into<String>, address: impl Into<String>, tls: Option<TlsMaterial>) -> Self {
        Self(Arc::new(RegistrationState {
            id: RegistrationId::new(),
            service: service.into(),
            address: address.into(),
            tls,
            failure_count: AtomicU32::new(0),
            suspected_unavailable: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> RegistrationId {
        self.0.id
    }

    pub fn service(&self) -> &str {
        &self.0.service
    }

    pub fn address(&self) -> &str {
        &self.0.address
    }

    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.0.tls.as_ref()
    }

    pub fn failure_count(&self) -> u32 {
        self.0.failure_count.load(Ordering::SeqCst)
    }

    pub fn is_suspected_unavailable(&self) -> bool {
        self.0.suspected_unavailable.load(Ordering::SeqCst)
    }
}

/// Crosses a failure count to "suspected unavailable" (`spec.md` §4.4).
const UNAVAILABLE_THRESHOLD: u32 = 3;

/// Ordered registrations for one service name with a rotating cursor
/// (`spec.md` §3 "Registrations set").
struct RegistrationsSet {
    list: RwLock<Vec<Registration>>,
    cursor: AtomicUsize,
}

impl RegistrationsSet {
    fn new() -> Self {
        Self { list: RwLock::new(Vec::new()), cursor: AtomicUsize::new(0) }
    }

    fn insert(&self, registration: Registration) {
        let mut list = self.list.write();
        if !list.iter().any(|r| r.id() == registration.id()) {
            list.push(registration);
        }
    }

    fn remove(&self, id: RegistrationId) -> bool {
        let mut list = self.list.write();
        let before = list.len();
        list.retain(|r| r.id() != id);
        list.len() != before
    }

    fn get(&self, id: RegistrationId) -> Option<Registration> {
        self.list.read().iter().find(|r| r.id() == id).cloned()
    }

    fn size(&self) -> usize {
        self.list.read().len()
    }

    /// Takes a snapshot, then round-robins across it; the cursor remains
    /// valid across concurrent iteration because iteration never touches the
    /// live list after the snapshot is taken (`spec.md` §3).
    fn snapshot(&self) -> Vec<Registration> {
        self.list.read().clone()
    }

    /// Round-robin across healthy registrations; if none are healthy, the
    /// full (all-suspected) set is exposed once rather than failing
    /// immediately (`spec.md` §4.5 "Failover tie-break").
    fn next_healthy(&self) -> Option<Registration> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return None;
        }
        let healthy: Vec<_> =
            snapshot.iter().filter(|r| !r.is_suspected_unavailable()).cloned().collect();
        let pool = if healthy.is_empty() { snapshot } else { healthy };
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % pool.len();
        Some(pool[idx].clone())
    }
}

/// Called when a registration is evicted, so the dispatcher (or transport)
/// can drop any cached client for it. No back-pointer is stored on the
/// registration itself (`spec.md` §9 "Cyclic registrations <-> dispatcher").
pub type EvictionHook = Arc<dyn Fn(&str, RegistrationId) + Send + Sync>;

/// Tracks remote peers' exported services as a `serviceName -> Registrations`
/// mapping (`spec.md` §4.4). Membership updates are serialized through
/// `write_lock` to keep the ordered lists consistent; readers act on
/// published snapshots.
pub struct RegistrationsManager {
    sets: RwLock<HashMap<String, Arc<RegistrationsSet>>>,
    write_lock: Mutex<()>,
    eviction_hooks: Mutex<Vec<EvictionHook>>,
}

impl Default for RegistrationsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationsManager {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            eviction_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn on_eviction(&self, hook: EvictionHook) {
        self.eviction_hooks.lock().push(hook);
    }

    fn set_for(&self, service: &str) -> Arc<RegistrationsSet> {
        if let Some(set) = self.sets.read().get(service) {
            return set.clone();
        }
        let mut sets = self.sets.write();
        sets.entry(service.to_string()).or_insert_with(|| Arc::new(RegistrationsSet::new())).clone()
    }

    /// A peer join: appends a registration (`spec.md` §4.4 "Membership updates").
    pub fn join(&self, registration: Registration) {
        let _guard = self.write_lock.lock();
        self.set_for(registration.service()).insert(registration);
    }

    /// A peer leave: removes by ID.
    pub fn leave(&self, service: &str, id: RegistrationId) {
        let _guard = self.write_lock.lock();
        if let Some(set) = self.sets.read().get(service) {
            set.remove(id);
        }
    }

    /// Returns a round-robin pick among the service's registrations,
    /// skipping suspected-unavailable ones unless all are suspected
    /// (`spec.md` §4.4 "getRegistrations").
    pub fn next(&self, service: &str) -> Option<Registration> {
        self.sets.read().get(service)?.next_healthy()
    }

    /// Full snapshot, for callers that want to attempt every registration
    /// rather than a single pick (the dispatcher's failover loop).
    pub fn snapshot(&self, service: &str) -> Vec<Registration> {
        self.sets.read().get(service).map(|s| s.snapshot()).unwrap_or_default()
    }

    pub fn size(&self, service: &str) -> usize {
        self.sets.read().get(service).map(|s| s.size()).unwrap_or(0)
    }

    /// Pinned lookup (`spec.md` §4.4 "getRegistration").
    pub fn get(&self, service: &str, id: RegistrationId) -> Option<Registration> {
        self.sets.read().get(service)?.get(id)
    }

    /// Increments the failure counter; crossing the threshold marks the
    /// registration suspected-unavailable (`spec.md` §4.4).
    pub fn add_unavailable_times(&self, registration: &Registration) {
        let count = registration.0.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= UNAVAILABLE_THRESHOLD {
            registration.0.suspected_unavailable.store(true, Ordering::SeqCst);
        }
    }

    /// Removes a registration after the dispatcher classified a remote call
    /// as `unavailable`, and notifies eviction hooks so the transport can
    /// drop its client pool. Idempotent — removing an already-gone
    /// registration is a no-op (`spec.md` §4.4).
    pub fn remove_unavailable_registration(&self, service: &str, id: RegistrationId) {
        let _guard = self.write_lock.lock();
        let removed = self.sets.read().get(service).map(|s| s.remove(id)).unwrap_or(false);
        if removed {
            for hook in self.eviction_hooks.lock().iter() {
                hook(service, id);
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
