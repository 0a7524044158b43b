#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! hyper backend for `eventline-http`
//!
//! Binds the [`Request`](eventline_http::Request) /
//! [`Response`](eventline_http::Response) contracts onto the `hyper-util`
//! legacy client:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - Optional per-request timeout
//! - Write-only request headers backed by an [`http::request::Builder`]
//!
//! The client is asynchronous; each factory owns a small tokio runtime and
//! blocks on it, so `execute()` and body reads must not be called from inside
//! another tokio runtime.
//!
//! # Example
//!
//! ```ignore
//! use eventline_http::{ContentEncoding, RequestFactory};
//! use eventline_http_hyper::HyperRequestFactory;
//!
//! let factory = HyperRequestFactory::builder()
//!     .content_encoding(ContentEncoding::Zstd)
//!     .build()?;
//! let mut request = factory.create_request(&uri, &http::Method::POST)?;
//! ```

mod body;
mod config;
mod factory;
mod headers;
mod request;
mod tls;

pub use config::{HyperTransportConfig, TlsRootConfig};
pub use factory::{HyperRequestFactory, HyperRequestFactoryBuilder};
pub use headers::WriteOnlyHeaders;
pub use request::HyperRequest;
