// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request context: the single channel through which a handler reaches
//! runtime services. No process-wide ambient state is permitted in the
//! handler path (`spec.md` §3, §9 "Ambient context").

use crate::argument::Argument;
use crate::clock::Clock;
use crate::error::CodeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Caller identity: an opaque bearer token plus whatever the authorization
/// check decoded from it. The core never interprets `attributes` — that is
/// an application-level authorization concern.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub token: String,
    pub principal: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Authorization {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { token: token.into(), principal: None, attributes: HashMap::new() }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

/// Metadata bag propagated across proxy hops, carried verbatim inside the
/// envelope JSON body (`spec.md` §4.6).
pub type MetaBag = HashMap<String, serde_json::Value>;

/// Structured tracing span for one request. A thin wrapper keeps the
/// dependency on `tracing` confined to one type rather than scattered across
/// every crate that opens spans.
#[derive(Clone)]
pub struct TracerHandle {
    span: tracing::Span,
}

impl TracerHandle {
    pub fn root() -> Self {
        Self { span: tracing::Span::current() }
    }

    pub fn from_span(span: tracing::Span) -> Self {
        Self { span }
    }

    /// Open a child span for a `service.fn` dispatch (`spec.md` §4.5 step 3a).
    /// `tracing` span names must be `'static`, so the qualified name is
    /// carried as a field rather than the span's literal name.
    pub fn dispatch_span(&self, service: &str, fn_name: &str) -> tracing::Span {
        let _entered = self.span.enter();
        tracing::info_span!("dispatch", service = %service, r#fn = %fn_name)
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl Default for TracerHandle {
    fn default() -> Self {
        Self::root()
    }
}

/// Structured logger bound to a request id, so every log line a handler
/// emits is attributable without the handler needing to know its own id.
#[derive(Clone)]
pub struct LoggerHandle {
    request_id: String,
}

impl LoggerHandle {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into() }
    }

    pub fn info(&self, message: &str) {
        tracing::info!(request_id = %self.request_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(request_id = %self.request_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(request_id = %self.request_id, "{}", message);
    }
}

/// What a [`RequestContext`] uses to reach other endpoints — local or
/// remote — without a process-wide singleton. Implemented by the
/// dispatcher; kept as a trait here so `fns-core` never depends on
/// `fns-dispatch` (breaking the cycle called out in `spec.md` §9).
#[async_trait]
pub trait RuntimeHandle: Send + Sync {
    async fn request(
        &self,
        ctx: &RequestContext,
        service: &str,
        fn_name: &str,
        argument: Argument,
    ) -> Result<serde_json::Value, CodeError>;
}

/// A `RuntimeHandle` that always reports `not-found`, for contexts
/// constructed without a live dispatcher (unit tests of individual
/// components that never call back into the runtime).
pub struct NoRuntime;

#[async_trait]
impl RuntimeHandle for NoRuntime {
    async fn request(
        &self,
        _ctx: &RequestContext,
        service: &str,
        _fn_name: &str,
        _argument: Argument,
    ) -> Result<serde_json::Value, CodeError> {
        Err(CodeError::not_found(format!("no runtime attached: {service}")))
    }
}

/// Immutable per-call context. Created when the transport accepts a
/// request; destroyed after the result is written (`spec.md` §3).
#[derive(Clone)]
pub struct RequestContext {
    pub id: String,
    pub deadline: Option<Instant>,
    pub authorization: Option<Authorization>,
    pub meta: MetaBag,
    pub tracer: TracerHandle,
    pub logger: LoggerHandle,
    pub runtime: Arc<dyn RuntimeHandle>,
    /// Grants access to services mounted with `internal = true`. Set only by
    /// the dispatcher when servicing an inter-service call, never by an
    /// external transport (`spec.md` §4.3).
    internal_access: bool,
}

impl RequestContext {
    pub fn new(id: impl Into<String>, runtime: Arc<dyn RuntimeHandle>) -> Self {
        let id = id.into();
        Self {
            logger: LoggerHandle::new(id.clone()),
            id,
            deadline: None,
            authorization: None,
            meta: MetaBag::new(),
            tracer: TracerHandle::root(),
            runtime,
            internal_access: false,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn with_internal_access(mut self) -> Self {
        self.internal_access = true;
        self
    }

    pub fn has_internal_access(&self) -> bool {
        self.internal_access
    }

    pub fn authorization_token(&self) -> Option<&str> {
        self.authorization.as_ref().map(|a| a.token.as_str())
    }

    /// Has the deadline already elapsed as of `clock.now()`?
    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        self.deadline.is_some_and(|d| clock.now() >= d)
    }

    /// Time left until the deadline, or `None` if there is none.
    pub fn time_remaining(&self, clock: &impl Clock) -> Option<std::time::Duration> {
        self.deadline.map(|d| d.saturating_duration_since(clock.now()))
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
