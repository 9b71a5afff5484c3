// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot and shutdown orchestration. The core never implements an HTTP
//! server; it defines the trait surface a transport crate must satisfy and
//! drives it to completion here (`spec.md` §6).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{LifecycleError, TransportError};
use crate::runtime::Runtime;

/// What serves the HTTP surface (`spec.md` §6) on top of a `Runtime`. A real
/// implementation binds a socket and dispatches `POST /{service}/{fn}`,
/// `GET /health`, `GET /documents/oas`; test code can use a fake that calls
/// straight into the dispatcher (`SPEC_FULL.md` §6).
#[async_trait]
pub trait Transport: Send {
    async fn serve(self, runtime: Arc<Runtime>) -> Result<(), TransportError>;
}

/// Runs `transport` to completion against `runtime`, then shuts the runtime
/// down within `shutdown_deadline`. Returns the process exit code (`spec.md`
/// §6 "Exit codes"): `0` on clean shutdown, non-zero if shutdown exceeded the
/// deadline.
pub async fn run<T: Transport>(
    runtime: Arc<Runtime>,
    transport: T,
    shutdown_deadline: std::time::Duration,
) -> i32 {
    info!(node_id = %runtime.node_id, name = %runtime.name, "starting fns runtime");

    let transport_failed = match transport.serve(runtime.clone()).await {
        Ok(()) => false,
        Err(err) => {
            error!(%err, "transport terminated with an error");
            true
        }
    };

    let shutdown_clean = match runtime.shutdown(shutdown_deadline).await {
        Ok(()) => {
            info!("shutdown complete");
            true
        }
        Err(LifecycleError::ShutdownTimeout(deadline)) => {
            warn!(?deadline, "stop application timeout");
            false
        }
        Err(other) => {
            error!(%other, "shutdown failed");
            false
        }
    };

    if shutdown_clean && !transport_failed {
        0
    } else {
        1
    }
}

#[cfg(test)]
#[path = "boot_tests.rs"]
mod tests;
