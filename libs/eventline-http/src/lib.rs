#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Backend-agnostic HTTP transport contracts for event-stream clients
//!
//! This crate defines the request/response abstraction every backend adapter
//! implements:
//! - Single-use [`Request`]s with a lazily buffered, encoded body
//! - [`Response`]s whose body is decoded according to the response's own
//!   `Content-Encoding`
//! - Capability-restricted request [`Headers`] (backends may be write-only)
//! - A fixed status-code → reason-phrase table
//!
//! # Content Encoding
//!
//! Request bodies are compressed with the configured [`ContentEncoding`]
//! (identity, gzip or zstd) and announced with `Content-Encoding` unless the
//! encoding is identity. Every request advertises `Accept-Encoding: gzip`,
//! whatever the request body uses.
//!
//! # Example
//!
//! ```ignore
//! use eventline_http::{RequestFactory, mime};
//! use std::io::Write;
//!
//! let mut request = factory.create_request(&uri, &http::Method::POST)?;
//! request.headers_mut().set_content_type(&mime::APPLICATION_JSON)?;
//! request.body()?.write_all(br#"[{"metadata":{}}]"#)?;
//!
//! let mut response = request.execute()?;
//! println!("{} {}", response.status_code(), response.status_text());
//! let events = response.read_to_vec()?;
//! response.close();
//! ```

mod config;
mod encoding;
mod error;
pub mod headers;
mod request;
mod response;
mod status;

pub use config::{
    ACCEPTED_ENCODING, DEFAULT_USER_AGENT, TransportConfig, TransportSecurity, parse_target,
    validate_target,
};
pub use encoding::{ContentEncoding, DecodingReader, EncodingWriter, UnknownEncoding};
pub use error::{HttpError, InvalidUriKind};
pub use headers::{HeaderMapExt, Headers, ResponseHeaders, header_pair};
pub use request::{BufferedBody, Request, RequestBody, RequestFactory, RequestLifecycle};
pub use response::{BodySource, Response, ResponseBody};
pub use status::status_text;

pub use http::{HeaderMap, Method, Uri};
pub use mime;
