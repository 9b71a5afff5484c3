// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ambient `Runtime`: the one explicit object threaded through every
//! `RequestContext` (`spec.md` §9 "Ambient context"). No process-wide
//! singleton carries the dispatcher, pool, or registry — a handler reaches
//! them only via `ctx.runtime`.

use async_trait::async_trait;
use fns_cluster::RegistrationsManager;
use fns_core::{Argument, CodeError, RequestContext, RuntimeHandle};
use fns_dispatch::{Dispatcher, RemoteCaller};
use fns_pool::{PoolConfig, WorkerPool};
use fns_registry::ServiceRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// `GET /health` response body (`spec.md` §6).
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub id: String,
    pub name: String,
    pub version: String,
    pub running: bool,
}

/// One node's worth of ambient state: the dispatcher (which in turn owns the
/// barrier, worker pool, local registry, and registrations manager), plus
/// identity fields every `RequestContext` and transport needs.
pub struct Runtime {
    pub node_id: String,
    pub name: String,
    pub version: String,
    started_at: Instant,
    dispatcher: Arc<Dispatcher>,
}

impl Runtime {
    /// Assembles a `Runtime` from a loaded `Config`, a registry populated by
    /// the caller's boot code (services are mounted before the registry is
    /// handed in — `spec.md` §3 "constructed at boot"), and a `RemoteCaller`
    /// (typically `fns_wire::ProxyClient`, or `fns_dispatch::NoRemoteCaller`
    /// for a single-node deployment).
    pub fn new(config: &Config, registry: Arc<ServiceRegistry>, remote: Arc<dyn RemoteCaller>) -> Self {
        let pool = WorkerPool::new(PoolConfig::with_defaults().max_workers(config.cluster.max_workers));
        pool.start();
        let registrations = Arc::new(RegistrationsManager::new());
        let dispatcher = Arc::new(Dispatcher::new(registry, registrations, pool, remote));
        Self {
            node_id: config.cluster.node_id.clone(),
            name: config.name.clone(),
            version: config.version.clone(),
            started_at: Instant::now(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            id: self.node_id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            running: true,
        }
    }

    /// Aggregates mounted services' raw OpenAPI fragments into one document
    /// (`spec.md` §6 `GET /documents/oas`). Each service's `document()` is an
    /// opaque JSON object the core never validates; fragments that fail to
    /// parse are skipped rather than failing the whole aggregation.
    pub fn openapi_document(&self) -> serde_json::Value {
        let mut paths = serde_json::Map::new();
        for name in self.dispatcher.registry().service_names() {
            let Ok(endpoint) = self.dispatcher.registry().get(&bootstrap_ctx(), &name) else {
                continue;
            };
            let Some(document) = endpoint.service.document() else { continue };
            if let Ok(serde_json::Value::Object(fragment)) = serde_json::from_str(document) {
                if let Some(serde_json::Value::Object(fragment_paths)) = fragment.get("paths") {
                    paths.extend(fragment_paths.clone());
                }
            }
        }
        serde_json::json!({
            "openapi": "3.0.3",
            "info": { "title": self.name, "version": self.version },
            "paths": serde_json::Value::Object(paths),
        })
    }

    /// Builds a fresh request context bound to this runtime, with internal
    /// access granted — for boot-time or inter-service calls only, never for
    /// an externally-originated request (`spec.md` §4.3).
    pub fn new_internal_context(runtime: &Arc<Self>, id: impl Into<String>) -> RequestContext {
        RequestContext::new(id, runtime.clone() as Arc<dyn RuntimeHandle>).with_internal_access()
    }

    /// Graceful shutdown: stops the worker pool (refuses new submissions,
    /// drains in-flight work) within `deadline`, reporting a timeout rather
    /// than hanging forever (`spec.md` §6 "Exit codes").
    pub async fn shutdown(&self, deadline: std::time::Duration) -> Result<(), crate::error::LifecycleError> {
        match tokio::time::timeout(deadline, self.dispatcher.pool().stop()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(crate::error::LifecycleError::ShutdownTimeout(deadline)),
        }
    }
}

#[async_trait]
impl RuntimeHandle for Runtime {
    async fn request(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
    ) -> Result<serde_json::Value, CodeError> {
        self.dispatcher.request(ctx, service, fn_name, argument).await.outcome
    }
}

/// A throwaway internal context used only to read registry metadata during
/// OpenAPI aggregation; never reaches a handler.
fn bootstrap_ctx() -> RequestContext {
    RequestContext::new("oas-aggregation", Arc::new(fns_core::NoRuntime)).with_internal_access()
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
