#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Request-factory contract suite run against the ureq backend.

use eventline_http::{RequestFactory, TransportConfig};
use eventline_http_test_support::contract;
use eventline_http_ureq::UreqRequestFactory;

fn factory(config: TransportConfig) -> Box<dyn RequestFactory> {
    Box::new(UreqRequestFactory::new(config).expect("ureq factory should build"))
}

#[test]
fn gzipped_response_is_decoded() {
    contract::gzipped_response_is_decoded(&factory);
}

#[test]
fn zstd_response_is_decoded() {
    contract::zstd_response_is_decoded(&factory);
}

#[test]
fn encoded_request_bodies() {
    contract::encoded_request_bodies(&factory);
}

#[test]
fn zstd_request_body() {
    contract::zstd_request_body(&factory);
}

#[test]
fn accept_encoding_always_gzip() {
    contract::accept_encoding_always_gzip(&factory);
}

#[test]
fn identity_sends_no_content_encoding() {
    contract::identity_sends_no_content_encoding(&factory);
}

#[test]
fn body_acquisition_is_idempotent() {
    contract::body_acquisition_is_idempotent(&factory);
}

#[test]
fn second_execute_fails() {
    contract::second_execute_fails(&factory);
}

#[test]
fn request_without_body() {
    contract::request_without_body(&factory);
}

#[test]
fn encoding_skipped_for_bodyless_methods() {
    contract::encoding_skipped_for_bodyless_methods(&factory);
}

#[test]
fn status_passthrough() {
    contract::status_passthrough(&factory);
}

#[test]
fn headers_on_the_wire() {
    contract::headers_on_the_wire(&factory);
}

#[test]
fn response_headers_readable() {
    contract::response_headers_readable(&factory);
}

#[test]
fn timeout_is_io_failure() {
    contract::timeout_is_io_failure(&factory);
}

#[test]
fn connection_refused_is_io_failure() {
    contract::connection_refused_is_io_failure(&factory);
}

#[test]
fn timeout_does_not_bound_body() {
    contract::timeout_does_not_bound_body(&factory);
}
