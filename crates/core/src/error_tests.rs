// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn http_status_matches_spec_table() {
    assert_eq!(ErrorKind::InvalidArgument.http_status(), 400);
    assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
    assert_eq!(ErrorKind::Forbidden.http_status(), 403);
    assert_eq!(ErrorKind::NotFound.http_status(), 404);
    assert_eq!(ErrorKind::NotAcceptable.http_status(), 406);
    assert_eq!(ErrorKind::Timeout.http_status(), 408);
    assert_eq!(ErrorKind::ServiceError.http_status(), 500);
    assert_eq!(ErrorKind::NotImplemented.http_status(), 501);
    assert_eq!(ErrorKind::Unavailable.http_status(), 503);
    assert_eq!(ErrorKind::Warning.http_status(), 555);
}

#[test]
fn only_unavailable_is_retryable() {
    for kind in [
        ErrorKind::InvalidArgument,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::NotAcceptable,
        ErrorKind::Timeout,
        ErrorKind::ServiceError,
        ErrorKind::NotImplemented,
        ErrorKind::Warning,
    ] {
        assert!(!kind.retryable(), "{kind} should not be retryable");
    }
    assert!(ErrorKind::Unavailable.retryable());
}

#[test]
fn kind_serializes_kebab_case() {
    let json = serde_json::to_string(&ErrorKind::InvalidArgument).unwrap();
    assert_eq!(json, "\"invalid-argument\"");
}

#[test]
fn error_round_trips_through_json_with_identical_fields() {
    let err = CodeError::not_found("service missing")
        .with_meta("service", vec!["echo".to_string()])
        .with_cause(CodeError::service_error("upstream exploded"));

    let json = serde_json::to_string(&err).unwrap();
    let back: CodeError = serde_json::from_str(&json).unwrap();

    assert_eq!(back.id, err.id);
    assert_eq!(back.kind, err.kind);
    assert_eq!(back.message, err.message);
    assert_eq!(back.meta, err.meta);
    assert_eq!(back.cause.unwrap().message, "upstream exploded");
}

#[test]
fn from_panic_recovers_str_payload() {
    let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
    let err = from_panic(payload);
    assert_eq!(err.kind, ErrorKind::ServiceError);
    assert!(err.message.contains("boom"));
}

#[test]
fn from_panic_recovers_string_payload() {
    let payload: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
    let err = from_panic(payload);
    assert!(err.message.contains("boom"));
}

#[test]
fn from_panic_falls_back_for_unknown_payload() {
    let payload: Box<dyn std::any::Any + Send> = Box::new(42i32);
    let err = from_panic(payload);
    assert!(err.message.contains("handler panicked"));
}
