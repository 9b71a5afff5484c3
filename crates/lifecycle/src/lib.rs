// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Application lifecycle: configuration loading, the ambient `Runtime`
//! object, and boot/shutdown orchestration (`SPEC_FULL.md` §9).
//!
//! This crate is the only one in the workspace that knows how to turn a
//! configuration document and a `Transport` implementation into a running
//! process with a well-defined exit code.

pub mod boot;
pub mod config;
pub mod error;
pub mod runtime;

pub use boot::{run, Transport};
pub use config::{ClusterConfig, Config, LogConfig, TransportConfig, ACTIVE_OVERLAY_VAR};
pub use error::{LifecycleError, TransportError};
pub use runtime::{HealthReport, Runtime};

/// Initializes the global `tracing` subscriber from `log` (`spec.md` §2
/// ambient logging row). Call once at process start; a second call is a
/// caller error figment would also reject for a duplicate config section,
/// so this silently no-ops via `tracing_subscriber`'s own `try_init`.
pub fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&log.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if log.json { subscriber.json().try_init() } else { subscriber.try_init() };
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
