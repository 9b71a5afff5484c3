// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cross-crate error taxonomy.
//!
//! Every fallible operation in the dispatch path returns (or eventually
//! converts into) a [`CodeError`]. Errors cross node boundaries as JSON and
//! must be reconstructed losslessly (stable id, kind, message, meta).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error classification. The wire status mapping lives in [`ErrorKind::http_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidArgument,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    Timeout,
    ServiceError,
    NotImplemented,
    Unavailable,
    Warning,
}

impl ErrorKind {
    /// HTTP status a transport should map this kind to (`spec.md` §6).
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::NotAcceptable => 406,
            ErrorKind::Timeout => 408,
            ErrorKind::ServiceError => 500,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Unavailable => 503,
            ErrorKind::Warning => 555,
        }
    }

    /// Whether the dispatcher should fail over to the next registration on
    /// this kind. Only `unavailable` is retryable (`spec.md` §7).
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::NotAcceptable => "not-acceptable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServiceError => "service-error",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// A classified, cross-node-serializable error.
///
/// `meta` holds structured detail (e.g. `{"field": ["name"]}` for a
/// validation failure); `cause` chains to the error that triggered this one,
/// preserved across a proxy hop so the caller sees the full chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeError {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub meta: std::collections::HashMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CodeError>>,
}

impl CodeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", kind, nanoid::nanoid!(8)),
            kind,
            message: message.into(),
            meta: std::collections::HashMap::new(),
            stacktrace: None,
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAcceptable, message)
    }

    pub fn service_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceError, message)
    }

    pub fn with_meta(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.meta.insert(key.into(), values);
        self
    }

    pub fn with_cause(mut self, cause: CodeError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.id, self.kind, self.message)
    }
}

impl std::error::Error for CodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Recovers a panic payload (as caught by `futures::FutureExt::catch_unwind`)
/// into a `service-error`-kind [`CodeError`].
pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> CodeError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    CodeError::service_error(format!("recovered panic: {message}"))
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
