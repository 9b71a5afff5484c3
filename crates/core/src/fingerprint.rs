// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint computation: a fixed-length digest over the identifying parts
//! of a request, used as the barrier key (`spec.md` §3, §4.1).

use crate::argument::Argument;
use crate::error::CodeError;
use sha2::{Digest, Sha256};
use std::fmt;

/// A fixed-length digest (SHA-256, 32 bytes) over
/// `{service, fn, canonical(argument), authorization}`.
///
/// Two requests with equal fingerprint are treated as interchangeable for
/// the duration of the barrier entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(
        service: &str,
        fn_name: &str,
        argument: &Argument,
        authorization: Option<&str>,
    ) -> Result<Self, CodeError> {
        let mut hasher = Sha256::new();
        hasher.update(service.as_bytes());
        hasher.update([0u8]);
        hasher.update(fn_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(argument.canonical()?);
        hasher.update([0u8]);
        hasher.update(authorization.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
