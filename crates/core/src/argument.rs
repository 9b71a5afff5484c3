// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler argument: a raw JSON byte sequence with a typed `scan` capability.
//!
//! The core never reflects over a handler's declared input type. A handler
//! declares the type it wants and calls `scan`; decoding happens once, at the
//! point of use, via ordinary `serde_json`.

use crate::error::{CodeError, ErrorKind};
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// The raw bytes of a single fn call's argument.
#[derive(Debug, Clone)]
pub struct Argument {
    bytes: Bytes,
}

impl Argument {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// An empty JSON object argument (`{}`), the default for fns with no input.
    pub fn empty() -> Self {
        Self { bytes: Bytes::from_static(b"{}") }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode into a caller-declared type. Decode failures are classified as
    /// `invalid-argument` (`spec.md` §7), never `service-error`.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T, CodeError> {
        serde_json::from_slice(&self.bytes).map_err(|err| {
            CodeError::new(ErrorKind::InvalidArgument, format!("invalid argument: {err}"))
        })
    }

    /// A stable, order-independent canonicalization used by the fingerprint
    /// (`spec.md` §3). Re-serializing through a `BTreeMap` sorts object keys;
    /// this is cheap compared to the network round trip it protects.
    pub fn canonical(&self) -> Result<Vec<u8>, CodeError> {
        let value: serde_json::Value = serde_json::from_slice(&self.bytes).map_err(|err| {
            CodeError::new(ErrorKind::InvalidArgument, format!("invalid argument: {err}"))
        })?;
        let canonical = canonicalize(&value);
        serde_json::to_vec(&canonical)
            .map_err(|err| CodeError::new(ErrorKind::Warning, format!("canonicalize: {err}")))
    }
}

impl From<serde_json::Value> for Argument {
    fn from(value: serde_json::Value) -> Self {
        // infallible: `Value` always serializes.
        let bytes = serde_json::to_vec(&value).unwrap_or_default();
        Self { bytes: Bytes::from(bytes) }
    }
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            serde_json::to_value(sorted).unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "argument_tests.rs"]
mod tests;
