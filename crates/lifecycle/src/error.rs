// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle errors: configuration loading and boot/shutdown orchestration.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("shutdown exceeded deadline of {0:?}, reporting as stop application timeout")]
    ShutdownTimeout(Duration),
}

/// What a concrete transport (HTTP server, in-process fake) returns on
/// failure. Kept separate from `LifecycleError` since transports are an
/// external collaborator (`spec.md` §6), not a core concern.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind: {0}")]
    Bind(String),

    #[error("transport error: {0}")]
    Other(String),
}
