// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service and fn handler contracts (`spec.md` §3).

use crate::argument::Argument;
use crate::context::RequestContext;
use crate::error::CodeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A callable consuming `(context, argument)` and producing a JSON result or
/// a classified error. Handlers must be idempotent-safe for retry only when
/// `idempotent()` returns true — the core never auto-retries regardless
/// (`spec.md` §3).
#[async_trait]
pub trait FnHandler: Send + Sync {
    async fn call(
        &self,
        ctx: &RequestContext,
        argument: Argument,
    ) -> Result<serde_json::Value, CodeError>;

    fn idempotent(&self) -> bool {
        false
    }

    /// Disabled fns exist but report `not-implemented` (`spec.md` §7) instead
    /// of being unmounted, so their presence is still visible in the OpenAPI
    /// document.
    fn enabled(&self) -> bool {
        true
    }
}

/// Wraps any async closure of the right shape as a [`FnHandler`], so trivial
/// fns (health checks, echo) don't need a one-off struct.
pub struct ClosureFn<F> {
    func: F,
}

impl<F, Fut> ClosureFn<F>
where
    F: Fn(RequestContext, Argument) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value, CodeError>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> FnHandler for ClosureFn<F>
where
    F: Fn(RequestContext, Argument) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value, CodeError>> + Send,
{
    async fn call(
        &self,
        ctx: &RequestContext,
        argument: Argument,
    ) -> Result<serde_json::Value, CodeError> {
        (self.func)(ctx.clone(), argument).await
    }
}

/// A named unit owning one or more fns (`spec.md` §3).
pub struct Service {
    name: String,
    internal: bool,
    document: Option<String>,
    fns: HashMap<String, Arc<dyn FnHandler>>,
}

impl Service {
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn get_fn(&self, fn_name: &str) -> Option<Arc<dyn FnHandler>> {
        self.fns.get(fn_name).cloned()
    }

    pub fn fn_names(&self) -> impl Iterator<Item = &str> {
        self.fns.keys().map(String::as_str)
    }
}

/// Builder for [`Service`], used at boot time before the registry is mounted
/// (`spec.md` §3 "constructed at boot, built once with a configuration
/// subtree, mounted into the registry").
pub struct ServiceBuilder {
    name: String,
    internal: bool,
    document: Option<String>,
    fns: HashMap<String, Arc<dyn FnHandler>>,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), internal: false, document: None, fns: HashMap::new() }
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_fn(mut self, name: impl Into<String>, handler: Arc<dyn FnHandler>) -> Self {
        self.fns.insert(name.into(), handler);
        self
    }

    /// Fails if the name is empty or a fn name collides (`spec.md` §4.3
    /// "fails if name empty or duplicate" — applied here rather than at
    /// mount time, since the builder is the boot-time single-writer).
    pub fn build(self) -> Result<Service, crate::error::CodeError> {
        if self.name.is_empty() {
            return Err(crate::error::CodeError::invalid_argument("service name must not be empty"));
        }
        Ok(Service { name: self.name, internal: self.internal, document: self.document, fns: self.fns })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
