// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Proxy envelope: serializes an outgoing remote call and verifies the
//! response (`spec.md` §4.6).
//!
//! Request layout: `[8-byte big-endian signature length][signature][JSON
//! body]`. The signature is a keyed MAC (HMAC-SHA256) over the JSON body;
//! envelopes with invalid signatures are rejected before the body is even
//! parsed, so a forged request never reaches `serde_json`.

use async_trait::async_trait;
use fns_cluster::Registration;
use fns_core::{Argument, CodeError, ErrorKind, MetaBag, RequestContext};
use fns_dispatch::{Outcome, RemoteCaller};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN_PREFIX: usize = 8;

/// Signs and verifies envelope bodies with a process-configured secret
/// (`spec.md` §9 "Ambient context" — the secret lives on `Runtime`, not a
/// global).
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
}

impl Signer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    fn mac(&self) -> Result<HmacSha256, CodeError> {
        // A key of any length is valid for HMAC; an empty secret is a
        // deployment mistake the caller is responsible for, not something
        // this layer rejects.
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| CodeError::new(ErrorKind::Warning, format!("invalid HMAC key: {err}")))
    }

    pub fn sign(&self, body: &[u8]) -> Result<Vec<u8>, CodeError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub fn verify(&self, body: &[u8], signature: &[u8]) -> Result<bool, CodeError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(mac.verify_slice(signature).is_ok())
    }
}

/// The JSON body of a request envelope: caller identity and metadata travel
/// alongside the argument so a proxied call looks, to the receiving node's
/// dispatcher, just like a locally-originated one (`spec.md` §3 "metadata
/// bag ... propagated across proxy hops").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub request_id: String,
    pub service: String,
    #[serde(rename = "fn")]
    pub fn_name: String,
    pub argument: serde_json::Value,
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub meta: MetaBag,
}

/// A tracing span reference the callee hands back so the caller can adopt
/// it as a remote child (`spec.md` §4.6 "Tracing stitching").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanAttachment {
    pub trace_id: String,
    pub span_id: String,
}

/// The JSON body of a response envelope (`spec.md` §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody {
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CodeError>,
}

impl ResponseBody {
    pub fn success(result: serde_json::Value, span: Option<SpanAttachment>) -> Self {
        Self { failed: false, span, result: Some(result), error: None }
    }

    pub fn failure(error: CodeError, span: Option<SpanAttachment>) -> Self {
        Self { failed: true, span, result: None, error: Some(error) }
    }

    /// `spec.md` §8 property 10: every kind survives this round trip with
    /// identical id, kind, message, and meta.
    pub fn into_outcome(self) -> Outcome {
        if self.failed {
            Err(self
                .error
                .unwrap_or_else(|| CodeError::new(ErrorKind::Warning, "failed envelope carried no error")))
        } else {
            Ok(self.result.unwrap_or(serde_json::Value::Null))
        }
    }
}

/// Encodes a request envelope: `[len][signature][json body]`.
pub fn encode_request(
    signer: &Signer,
    ctx: &RequestContext,
    service: &str,
    fn_name: &str,
    argument: &Argument,
) -> Result<Vec<u8>, CodeError> {
    let argument_value: serde_json::Value = serde_json::from_slice(argument.as_bytes())
        .map_err(|err| CodeError::invalid_argument(format!("argument is not valid JSON: {err}")))?;
    let body = RequestBody {
        request_id: ctx.id.clone(),
        service: service.to_string(),
        fn_name: fn_name.to_string(),
        argument: argument_value,
        authorization: ctx.authorization_token().map(str::to_string),
        meta: ctx.meta.clone(),
    };
    let body_bytes = serde_json::to_vec(&body)
        .map_err(|err| CodeError::new(ErrorKind::Warning, format!("encode envelope: {err}")))?;
    let signature = signer.sign(&body_bytes)?;

    let mut out = Vec::with_capacity(SIGNATURE_LEN_PREFIX + signature.len() + body_bytes.len());
    out.extend_from_slice(&(signature.len() as u64).to_be_bytes());
    out.extend_from_slice(&signature);
    out.extend_from_slice(&body_bytes);
    Ok(out)
}

/// Decodes and verifies a request envelope. Any bit-flip in the JSON body or
/// signature is rejected with `warning` before the body is parsed
/// (`spec.md` §8 property 9).
pub fn decode_request(signer: &Signer, envelope: &[u8]) -> Result<RequestBody, CodeError> {
    if envelope.len() < SIGNATURE_LEN_PREFIX {
        return Err(CodeError::new(ErrorKind::Warning, "envelope shorter than length prefix"));
    }
    let mut len_bytes = [0u8; SIGNATURE_LEN_PREFIX];
    len_bytes.copy_from_slice(&envelope[..SIGNATURE_LEN_PREFIX]);
    let sig_len = u64::from_be_bytes(len_bytes) as usize;

    let rest = &envelope[SIGNATURE_LEN_PREFIX..];
    if rest.len() < sig_len {
        return Err(CodeError::new(ErrorKind::Warning, "envelope truncated before full signature"));
    }
    let (signature, body_bytes) = rest.split_at(sig_len);

    if !signer.verify(body_bytes, signature)? {
        return Err(CodeError::new(ErrorKind::Warning, "envelope signature verification failed"));
    }

    serde_json::from_slice(body_bytes)
        .map_err(|err| CodeError::new(ErrorKind::Warning, format!("malformed envelope body: {err}")))
}

pub fn encode_response(body: &ResponseBody) -> Result<Vec<u8>, CodeError> {
    serde_json::to_vec(body)
        .map_err(|err| CodeError::new(ErrorKind::Warning, format!("encode response: {err}")))
}

pub fn decode_response(bytes: &[u8]) -> Result<ResponseBody, CodeError> {
    serde_json::from_slice(bytes)
        .map_err(|err| CodeError::new(ErrorKind::Warning, format!("malformed response body: {err}")))
}

/// What actually moves bytes between nodes — a concrete HTTP client (out of
/// scope per `spec.md` §1). [`ProxyClient`] drives this trait to turn a
/// [`RemoteCaller::call`] into one signed request/response round trip.
#[async_trait]
pub trait EnvelopeSender: Send + Sync {
    async fn send(&self, registration: &Registration, envelope: Vec<u8>) -> Result<Vec<u8>, CodeError>;
}

/// Glues [`fns_dispatch::RemoteCaller`] to a concrete [`EnvelopeSender`],
/// signing outgoing envelopes and verifying/decoding responses
/// (`spec.md` §4.6, "Proxy transport glue").
pub struct ProxyClient {
    signer: Signer,
    sender: Arc<dyn EnvelopeSender>,
}

impl ProxyClient {
    pub fn new(signer: Signer, sender: Arc<dyn EnvelopeSender>) -> Self {
        Self { signer, sender }
    }
}

#[async_trait]
impl RemoteCaller for ProxyClient {
    async fn call(
        &self,
        ctx: &RequestContext,
        registration: &Registration,
        fn_name: &str,
        argument: Argument,
    ) -> Outcome {
        let request = encode_request(&self.signer, ctx, registration.service(), fn_name, &argument)?;
        let response_bytes = self.sender.send(registration, request).await?;
        let response = decode_response(&response_bytes)?;
        if let Some(span) = &response.span {
            tracing::info!(
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                "adopted remote span as child"
            );
        }
        response.into_outcome()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
