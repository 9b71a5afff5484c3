// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The endpoint dispatcher: the orchestration layer that resolves a target,
//! wraps the handler invocation in barrier + tracing + worker pool +
//! timeout + error classification, and returns the result (`spec.md` §4.5).

use async_trait::async_trait;
use fns_barrier::Barrier;
use fns_cluster::{Registration, RegistrationsManager};
use fns_core::{Argument, CodeError, ErrorKind, Fingerprint, RegistrationId, RequestContext};
use fns_pool::{BoxedJob, WorkerPool};
use fns_registry::ServiceRegistry;
use std::sync::Arc;
use tracing::Instrument;

pub type Outcome = Result<serde_json::Value, CodeError>;

/// What a remote call needs: send the envelope, get back a decoded payload
/// or a classified error. Implemented by `fns-wire` (or a transport crate);
/// kept as a trait here so `fns-dispatch` never depends on the wire format
/// (`spec.md` §4.6 is a separate, lower component).
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn call(
        &self,
        ctx: &RequestContext,
        registration: &Registration,
        fn_name: &str,
        argument: Argument,
    ) -> Outcome;
}

/// A `RemoteCaller` that always reports `unavailable`, for dispatchers built
/// without a live transport (unit tests that exercise only the local path).
pub struct NoRemoteCaller;

#[async_trait]
impl RemoteCaller for NoRemoteCaller {
    async fn call(
        &self,
        _ctx: &RequestContext,
        registration: &Registration,
        _fn_name: &str,
        _argument: Argument,
    ) -> Outcome {
        Err(CodeError::unavailable(format!("no transport attached: {}", registration.address())))
    }
}

/// The result of a dispatched request, including whether this caller
/// attached to an in-flight barrier entry rather than leading it
/// (`spec.md` §4.1 `shared`).
pub struct DispatchResult {
    pub outcome: Outcome,
    pub shared: bool,
}

enum ResolvedTarget {
    Local(Arc<fns_core::Service>),
    RemoteMany,
    RemoteOne(Registration),
}

/// Orchestrates a single `{service, fn}` call end to end.
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    registrations: Arc<RegistrationsManager>,
    pool: WorkerPool,
    barrier: Barrier<Fingerprint>,
    remote: Arc<dyn RemoteCaller>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        registrations: Arc<RegistrationsManager>,
        pool: WorkerPool,
        remote: Arc<dyn RemoteCaller>,
    ) -> Self {
        Self { registry, registrations, pool, barrier: Barrier::new(), remote }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn registrations(&self) -> &RegistrationsManager {
        &self.registrations
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// `spec.md` §4.5 "request(context, service, fn, argument) -> resultFuture".
    pub async fn request(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
    ) -> DispatchResult {
        let target = match self.resolve(ctx, service) {
            Ok(target) => target,
            Err(err) => return DispatchResult { outcome: Err(err), shared: false },
        };
        self.run(ctx, service, fn_name, argument, target).await
    }

    /// A caller-pinned variant: `nodeId` selects this node (local, requires
    /// internal access per `fns_registry::ServiceRegistry::get_exact`) or a
    /// specific `registrationId` on another node. A pinned remote call that
    /// returns `unavailable` records the failure but never fails over
    /// (`spec.md` §9 "Open questions").
    pub async fn request_pinned(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
        node_id: &str,
        registration_id: Option<RegistrationId>,
    ) -> DispatchResult {
        let target = if node_id == self.registry.node_id() {
            self.registry.get_exact(ctx, service, node_id).map(|e| ResolvedTarget::Local(e.service))
        } else {
            match registration_id {
                Some(id) => self.registrations.get(service, id).map(ResolvedTarget::RemoteOne).ok_or_else(
                    || CodeError::not_found(format!("registration not found: {service}/{id}")),
                ),
                None => Err(CodeError::not_found(format!("no registration pinned for {service}"))),
            }
        };
        let target = match target {
            Ok(target) => target,
            Err(err) => return DispatchResult { outcome: Err(err), shared: false },
        };
        self.run(ctx, service, fn_name, argument, target).await
    }

    /// `spec.md` §4.5 step 1: local registry first; fall back to the
    /// registrations manager only when the caller carries internal access.
    fn resolve(&self, ctx: &RequestContext, service: &str) -> Result<ResolvedTarget, CodeError> {
        match self.registry.get(ctx, service) {
            Ok(endpoint) => Ok(ResolvedTarget::Local(endpoint.service)),
            Err(err) if err.kind == ErrorKind::NotFound => {
                if ctx.has_internal_access() && self.registrations.size(service) > 0 {
                    Ok(ResolvedTarget::RemoteMany)
                } else {
                    Err(CodeError::not_found(format!("service not found: {service}")))
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
        target: ResolvedTarget,
    ) -> DispatchResult {
        let key = match Fingerprint::compute(service, fn_name, &argument, ctx.authorization_token()) {
            Ok(key) => key,
            Err(err) => return DispatchResult { outcome: Err(err), shared: false },
        };

        let span = ctx.tracer.dispatch_span(service, fn_name);
        let job = self.build_job(ctx, service, fn_name, argument, target);
        let pool = self.pool.clone();
        let deadline = ctx.deadline;

        let (outcome, shared) = self
            .barrier
            .run(ctx, key, async move {
                let Some(sink) = pool.submit(job) else {
                    return Err(CodeError::not_acceptable("worker pool saturated"));
                };
                match deadline {
                    Some(deadline) => {
                        tokio::select! {
                            outcome = sink.wait() => outcome,
                            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                                Err(CodeError::timeout("deadline elapsed waiting on result sink"))
                            }
                        }
                    }
                    None => sink.wait().await,
                }
            })
            .instrument(span)
            .await;

        DispatchResult { outcome, shared }
    }

    fn build_job(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
        target: ResolvedTarget,
    ) -> BoxedJob {
        let ctx = ctx.clone();
        let fn_name = fn_name.to_string();
        match target {
            ResolvedTarget::Local(service) => Box::pin(async move {
                let handler = service
                    .get_fn(&fn_name)
                    .ok_or_else(|| CodeError::not_found(format!("fn not found: {fn_name}")))?;
                if !handler.enabled() {
                    return Err(CodeError::new(ErrorKind::NotImplemented, format!("fn disabled: {fn_name}")));
                }
                handler.call(&ctx, argument).await
            }),
            ResolvedTarget::RemoteOne(registration) => {
                let remote = self.remote.clone();
                let registrations = self.registrations.clone();
                Box::pin(async move {
                    match remote.call(&ctx, &registration, &fn_name, argument).await {
                        Err(err) if err.kind == ErrorKind::Unavailable => {
                            registrations.add_unavailable_times(&registration);
                            Err(err)
                        }
                        other => other,
                    }
                })
            }
            ResolvedTarget::RemoteMany => {
                let remote = self.remote.clone();
                let registrations = self.registrations.clone();
                let service = service.to_string();
                Box::pin(remote_many(remote, registrations, ctx, service, fn_name, argument))
            }
        }
    }
}

/// `spec.md` §4.5 step 4, non-pinned remote case: iterate registrations via
/// round-robin until one succeeds or returns a non-`unavailable` error; on
/// `unavailable`, bump the failure counter and try the next one; on
/// exhaustion, return `notFound`.
async fn remote_many(
    remote: Arc<dyn RemoteCaller>,
    registrations: Arc<RegistrationsManager>,
    ctx: RequestContext,
    service: String,
    fn_name: String,
    argument: Argument,
) -> Outcome {
    let mut attempts_left = registrations.size(&service);
    if attempts_left == 0 {
        return Err(CodeError::not_found(format!("no registrations available for {service}")));
    }
    let mut current = match registrations.next(&service) {
        Some(reg) => reg,
        None => return Err(CodeError::not_found(format!("no registrations available for {service}"))),
    };
    loop {
        match remote.call(&ctx, &current, &fn_name, argument.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind == ErrorKind::Unavailable => {
                registrations.add_unavailable_times(&current);
                attempts_left -= 1;
                if attempts_left == 0 {
                    return Err(CodeError::not_found(format!("registrations exhausted for {service}")));
                }
                current = match registrations.next(&service) {
                    Some(next) => next,
                    None => {
                        return Err(CodeError::not_found(format!(
                            "registrations exhausted for {service}"
                        )))
                    }
                };
            }
            other => return other,
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
