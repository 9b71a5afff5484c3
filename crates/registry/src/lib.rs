// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Local service registry: `name -> (service, flags)` and the internal-only
//! access rule (`spec.md` §4.3).

use fns_core::{CodeError, RequestContext, Service};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A registry-resolved local endpoint — just enough to carry the resolved
/// service through to the dispatcher without re-checking visibility rules.
pub struct LocalEndpoint {
    pub service: Arc<Service>,
}

/// Maps service names to mounted services. Mount happens only during boot;
/// lookups are lock-free after boot in spirit (a single `RwLock` read,
/// never contended once mounting stops) (`spec.md` §4.3).
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<Service>>>,
    node_id: String,
}

impl ServiceRegistry {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self { services: RwLock::new(HashMap::new()), node_id: node_id.into() }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Registers a service. Fails if the name is empty (already rejected by
    /// `ServiceBuilder::build`) or already mounted (`spec.md` §4.3).
    pub fn mount(&self, service: Service) -> Result<(), CodeError> {
        if service.name().is_empty() {
            return Err(CodeError::invalid_argument("service name must not be empty"));
        }
        let mut services = self.services.write();
        if services.contains_key(service.name()) {
            return Err(CodeError::invalid_argument(format!(
                "service already mounted: {}",
                service.name()
            )));
        }
        services.insert(service.name().to_string(), Arc::new(service));
        Ok(())
    }

    /// Returns a local endpoint if the service exists and either it is not
    /// internal or the context carries internal access (`spec.md` §4.3).
    /// Internal services are invisible to external callers regardless of
    /// existence — the error is `not-found`, never `forbidden`, so their
    /// presence cannot be probed for.
    pub fn get(&self, ctx: &RequestContext, name: &str) -> Result<LocalEndpoint, CodeError> {
        let services = self.services.read();
        match services.get(name) {
            Some(service) if !service.is_internal() || ctx.has_internal_access() => {
                Ok(LocalEndpoint { service: service.clone() })
            }
            _ => Err(CodeError::not_found(format!("service not found: {name}"))),
        }
    }

    /// Constrained variant used by the remote dispatcher when a caller has
    /// pinned a specific node. Behaves like [`Self::get`] when `node_id`
    /// matches this node, but always requires internal access — a pinned
    /// call is by definition an inter-node call (`spec.md` §4.3).
    pub fn get_exact(
        &self,
        ctx: &RequestContext,
        name: &str,
        node_id: &str,
    ) -> Result<LocalEndpoint, CodeError> {
        if node_id != self.node_id {
            return Err(CodeError::not_found(format!(
                "service not found on this node: {name}@{node_id}"
            )));
        }
        let services = self.services.read();
        match services.get(name) {
            Some(service) if ctx.has_internal_access() => {
                Ok(LocalEndpoint { service: service.clone() })
            }
            _ => Err(CodeError::not_found(format!("service not found: {name}"))),
        }
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }

    /// Whether a service is mounted at all, ignoring visibility — used by
    /// the dispatcher to decide whether to fall through to the registrations
    /// manager (`spec.md` §4.5 step 1).
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
