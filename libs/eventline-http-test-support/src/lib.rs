#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Shared test tooling for `eventline-http` adapters
//!
//! - [`RecordingServer`]: a local axum server that records every request and
//!   decodes request bodies on its own, independently of the code under test
//! - [`contract`]: the behaviour every [`RequestFactory`](eventline_http::RequestFactory)
//!   must show, as plain functions an adapter calls from its `tests/`
//!
//! The server runs on a dedicated thread with its own runtime, so blocking
//! adapters can be driven from ordinary `#[test]` functions.

pub mod contract;
mod server;

pub use server::{RecordedRequest, RecordingServer, SLOW_RESPONSE_DELAY, TRICKLE_BODY_DELAY};
