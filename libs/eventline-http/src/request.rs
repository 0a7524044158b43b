//! Single-use outgoing requests.
//!
//! A request moves through `Unexecuted → (header mutations)* →
//! (body acquired)? → Executed`. `Executed` is terminal: acquiring the body
//! or executing again fails with [`HttpError::AlreadyExecuted`].
//!
//! Adapters embed a [`RequestLifecycle`] and only supply the backend call, so
//! buffering, encoding and the single-execution rule behave the same on every
//! backend.

use crate::encoding::{ContentEncoding, EncodingWriter};
use crate::error::HttpError;
use crate::headers::{CONTENT_ENCODING, Headers};
use crate::response::Response;
use http::{Method, Uri};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Initial capacity of the in-memory request body buffer.
const INITIAL_BODY_CAPACITY: usize = 1024;

/// The sink handed out by [`Request::body`]: an encoder over an in-memory buffer.
pub type RequestBody = EncodingWriter<Vec<u8>>;

/// An outgoing HTTP call.
///
/// Not meant to be shared between threads before execution.
pub trait Request: Send {
    /// Uppercase HTTP verb.
    fn method(&self) -> &Method;

    /// Absolute target.
    fn uri(&self) -> &Uri;

    /// Header view. Reads may be unsupported by the backend.
    fn headers(&self) -> &dyn Headers;

    /// Mutable header view.
    fn headers_mut(&mut self) -> &mut dyn Headers;

    /// The body sink. The first call allocates the buffer and installs the
    /// content encoding; later calls return the same sink.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::AlreadyExecuted`] once the request was executed.
    fn body(&mut self) -> Result<&mut RequestBody, HttpError>;

    /// Send the request and block until the status line and headers arrive.
    ///
    /// Non-2xx statuses are ordinary responses.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::AlreadyExecuted`] on a second call and
    /// [`HttpError::Io`] for every transport failure, including timeouts.
    fn execute(&mut self) -> Result<Response, HttpError>;
}

/// Produces fresh, unexecuted requests.
pub trait RequestFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUri`] or [`HttpError::InvalidScheme`] when
    /// the target is not acceptable to the transport.
    fn create_request(&self, uri: &Uri, method: &Method) -> Result<Box<dyn Request>, HttpError>;
}

impl<F: RequestFactory + ?Sized> RequestFactory for Arc<F> {
    fn create_request(&self, uri: &Uri, method: &Method) -> Result<Box<dyn Request>, HttpError> {
        (**self).create_request(uri, method)
    }
}

impl<F: RequestFactory + ?Sized> RequestFactory for Box<F> {
    fn create_request(&self, uri: &Uri, method: &Method) -> Result<Box<dyn Request>, HttpError> {
        (**self).create_request(uri, method)
    }
}

/// Lazily allocated body buffer: unallocated until first acquisition.
#[derive(Debug, Default)]
pub struct BufferedBody {
    writer: Option<RequestBody>,
}

impl BufferedBody {
    /// Return the body writer, allocating it with `encoding` on first use.
    ///
    /// The flag is `true` when this call allocated the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be created.
    pub fn acquire(&mut self, encoding: ContentEncoding) -> io::Result<(&mut RequestBody, bool)> {
        let allocated = self.writer.is_none();
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => encoding.wrap(Vec::with_capacity(INITIAL_BODY_CAPACITY))?,
        };
        Ok((self.writer.insert(writer), allocated))
    }

    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.writer.is_some()
    }

    /// Complete the encoded stream and take the bytes; `None` if never acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to write its trailer.
    pub fn finish(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.writer.take().map(EncodingWriter::finish).transpose()
    }
}

/// Backend-independent request state.
#[derive(Debug)]
pub struct RequestLifecycle {
    method: Method,
    uri: Uri,
    encoding: ContentEncoding,
    timeout: Option<Duration>,
    body: BufferedBody,
    executed: bool,
}

impl RequestLifecycle {
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        encoding: ContentEncoding,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            method,
            uri,
            encoding,
            timeout,
            body: BufferedBody::default(),
            executed: false,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Encoding actually applied to this request's body.
    ///
    /// Falls back to identity when the configured encoding does not apply to
    /// the method.
    #[must_use]
    pub fn body_encoding(&self) -> ContentEncoding {
        if self.encoding.is_applicable_to(&self.method) {
            self.encoding
        } else {
            ContentEncoding::Identity
        }
    }

    /// # Errors
    ///
    /// Returns [`HttpError::AlreadyExecuted`] once executed.
    pub fn ensure_not_executed(&self) -> Result<(), HttpError> {
        if self.executed {
            return Err(HttpError::AlreadyExecuted);
        }
        Ok(())
    }

    /// Acquire the body sink, announcing the encoding on first acquisition.
    ///
    /// `Content-Encoding` is only written for non-identity encodings.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::AlreadyExecuted`] once executed, or an I/O error
    /// if the encoder cannot be created.
    pub fn acquire_body(&mut self, headers: &mut dyn Headers) -> Result<&mut RequestBody, HttpError> {
        self.ensure_not_executed()?;
        let encoding = self.body_encoding();
        let (writer, allocated) = self.body.acquire(encoding)?;
        if allocated && encoding.is_announced() {
            headers.put(CONTENT_ENCODING.as_str(), encoding.token())?;
        }
        Ok(writer)
    }

    /// Mark the request executed and hand over the encoded payload.
    ///
    /// The request is dead afterwards, whether or not the backend call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::AlreadyExecuted`] on a second call, or an I/O
    /// error if the encoder fails to complete its stream.
    pub fn begin_execution(&mut self) -> Result<Option<Vec<u8>>, HttpError> {
        self.ensure_not_executed()?;
        self.executed = true;
        let payload = self.body.finish()?;
        tracing::debug!(
            method = %self.method,
            uri = %self.uri,
            encoding = %self.body_encoding(),
            payload_bytes = payload.as_ref().map(Vec::len),
            "executing request"
        );
        Ok(payload)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::headers::HeaderMapExt;
    use http::HeaderMap;
    use mime::Mime;
    use std::collections::BTreeSet;
    use std::io::{Read, Write};

    /// Readable in-memory header view for exercising the lifecycle.
    #[derive(Default)]
    struct MapHeaders(HeaderMap);

    impl Headers for MapHeaders {
        fn get(&self, name: &str) -> Result<Vec<String>, HttpError> {
            Ok(self.0.values_of(name))
        }

        fn header_names(&self) -> Result<BTreeSet<String>, HttpError> {
            Ok(self.0.names())
        }

        fn add(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
            let (name, value) = crate::headers::header_pair(name, value)?;
            self.0.append(name, value);
            Ok(())
        }

        fn put(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
            let (name, value) = crate::headers::header_pair(name, value)?;
            self.0.insert(name, value);
            Ok(())
        }

        fn content_length(&self) -> Result<Option<u64>, HttpError> {
            Ok(self.0.parsed_content_length())
        }

        fn set_content_length(&mut self, _: u64) -> Result<(), HttpError> {
            Err(HttpError::ContentLengthManaged)
        }

        fn content_type(&self) -> Result<Option<Mime>, HttpError> {
            Ok(self.0.parsed_content_type())
        }
    }

    fn lifecycle(method: Method, encoding: ContentEncoding) -> RequestLifecycle {
        RequestLifecycle::new(
            method,
            Uri::from_static("http://localhost/events"),
            encoding,
            None,
        )
    }

    #[test]
    fn test_body_acquisition_is_idempotent() {
        let mut request = lifecycle(Method::POST, ContentEncoding::Gzip);
        let mut headers = MapHeaders::default();

        let first: *const RequestBody = request.acquire_body(&mut headers).unwrap();
        let second: *const RequestBody = request.acquire_body(&mut headers).unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(headers.get("content-encoding").unwrap(), vec!["gzip"]);
    }

    #[test]
    fn test_writes_through_both_acquisitions_are_kept() {
        let mut request = lifecycle(Method::POST, ContentEncoding::Zstd);
        let mut headers = MapHeaders::default();

        request.acquire_body(&mut headers).unwrap().write_all(b"{").unwrap();
        request.acquire_body(&mut headers).unwrap().write_all(b"}").unwrap();

        let payload = request.begin_execution().unwrap().unwrap();
        assert_eq!(zstd::decode_all(payload.as_slice()).unwrap(), b"{}");
    }

    #[test]
    fn test_identity_sets_no_content_encoding() {
        let mut request = lifecycle(Method::POST, ContentEncoding::Identity);
        let mut headers = MapHeaders::default();

        request.acquire_body(&mut headers).unwrap().write_all(b"{}").unwrap();
        assert!(headers.get("content-encoding").unwrap().is_empty());
        assert_eq!(request.begin_execution().unwrap().unwrap(), b"{}");
    }

    #[test]
    fn test_encoding_skipped_for_bodyless_methods() {
        let mut request = lifecycle(Method::GET, ContentEncoding::Gzip);
        let mut headers = MapHeaders::default();

        assert_eq!(request.body_encoding(), ContentEncoding::Identity);
        request.acquire_body(&mut headers).unwrap().write_all(b"raw").unwrap();
        assert!(headers.get("content-encoding").unwrap().is_empty());
        assert_eq!(request.begin_execution().unwrap().unwrap(), b"raw");
    }

    #[test]
    fn test_gzip_payload_is_complete_stream() {
        let mut request = lifecycle(Method::PUT, ContentEncoding::Gzip);
        let mut headers = MapHeaders::default();
        request.acquire_body(&mut headers).unwrap().write_all(b"{}").unwrap();

        let payload = request.begin_execution().unwrap().unwrap();
        let mut plain = String::new();
        flate2::read::GzDecoder::new(payload.as_slice())
            .read_to_string(&mut plain)
            .unwrap();
        assert_eq!(plain, "{}");
    }

    #[test]
    fn test_no_body_means_no_payload() {
        let mut request = lifecycle(Method::POST, ContentEncoding::Gzip);
        assert_eq!(request.begin_execution().unwrap(), None);
    }

    #[test]
    fn test_second_execution_fails() {
        let mut request = lifecycle(Method::GET, ContentEncoding::Identity);
        request.begin_execution().unwrap();
        assert!(request.is_executed());
        assert!(matches!(
            request.begin_execution(),
            Err(HttpError::AlreadyExecuted)
        ));
    }

    #[test]
    fn test_body_after_execution_fails() {
        let mut request = lifecycle(Method::POST, ContentEncoding::Identity);
        let mut headers = MapHeaders::default();
        request.begin_execution().unwrap();
        assert!(matches!(
            request.acquire_body(&mut headers),
            Err(HttpError::AlreadyExecuted)
        ));
    }

    #[test]
    fn test_buffered_body_states() {
        let mut body = BufferedBody::default();
        assert!(!body.is_allocated());
        let (_, allocated) = body.acquire(ContentEncoding::Identity).unwrap();
        assert!(allocated);
        let (_, allocated) = body.acquire(ContentEncoding::Identity).unwrap();
        assert!(!allocated);
        assert!(body.is_allocated());
        assert_eq!(body.finish().unwrap(), Some(Vec::new()));
        assert!(!body.is_allocated());
    }
}
