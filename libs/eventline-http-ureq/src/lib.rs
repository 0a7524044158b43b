#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Blocking `ureq` backend for `eventline-http`
//!
//! Request headers live in a readable [`http::HeaderMap`], so every
//! [`Headers`](eventline_http::Headers) read works here, unlike in write-only
//! backends. `Content-Length` is still derived from the body by ureq.

mod factory;
mod headers;
mod request;

pub use factory::UreqRequestFactory;
pub use headers::ReadableHeaders;
pub use request::UreqRequest;
