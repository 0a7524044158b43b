use crate::encoding::{ContentEncoding, DecodingReader};
use crate::error::HttpError;
use crate::headers::ResponseHeaders;
use crate::status::status_text;
use http::HeaderMap;
use std::fmt;
use std::io::{self, Read};

/// Raw, still-encoded body stream supplied by a backend adapter.
pub trait BodySource: Read + Send {
    /// Give the underlying connection back to the backend.
    ///
    /// # Errors
    ///
    /// Release failures are reported here but never reach the caller of
    /// [`Response::close`].
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BodySource for io::Empty {}

impl BodySource for io::Cursor<Vec<u8>> {}

/// Decoded response body stream.
pub type ResponseBody = DecodingReader<Box<dyn BodySource>>;

enum BodyState {
    Pending(Box<dyn BodySource>),
    Open(ResponseBody),
    Closed,
}

/// A completed HTTP call: status, headers and a body stream.
///
/// The body is decoded according to the response's own `Content-Encoding`,
/// independently of the encoding the request used. The stream is released by
/// [`close`](Response::close) or, at the latest, when the response is dropped.
pub struct Response {
    status: u16,
    headers: ResponseHeaders,
    body: BodyState,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: Box<dyn BodySource>) -> Self {
        tracing::debug!(status, "response received");
        Self {
            status,
            headers: ResponseHeaders::new(headers),
            body: BodyState::Pending(body),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Reason phrase derived from the status code; empty for unknown codes.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        status_text(self.status)
    }

    #[must_use]
    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// The decoded body stream. Later calls return the same stream.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::BodyClosed`] after [`close`](Response::close), or
    /// an I/O error if the decoder cannot be created.
    pub fn body(&mut self) -> Result<&mut ResponseBody, HttpError> {
        let decoder = match std::mem::replace(&mut self.body, BodyState::Closed) {
            BodyState::Pending(raw) => {
                let encoding = self
                    .headers
                    .content_encoding()
                    .unwrap_or(ContentEncoding::Identity);
                encoding.decode(raw)?
            }
            BodyState::Open(decoder) => decoder,
            BodyState::Closed => return Err(HttpError::BodyClosed),
        };
        self.body = BodyState::Open(decoder);
        match &mut self.body {
            BodyState::Open(decoder) => Ok(decoder),
            BodyState::Pending(_) | BodyState::Closed => Err(HttpError::BodyClosed),
        }
    }

    /// Take ownership of the decoded body stream.
    ///
    /// The caller becomes responsible for dropping it; the connection is not
    /// explicitly released.
    ///
    /// # Errors
    ///
    /// Same as [`body`](Response::body).
    pub fn into_body(mut self) -> Result<ResponseBody, HttpError> {
        self.body()?;
        match std::mem::replace(&mut self.body, BodyState::Closed) {
            BodyState::Open(decoder) => Ok(decoder),
            BodyState::Pending(_) | BodyState::Closed => Err(HttpError::BodyClosed),
        }
    }

    /// Read the whole decoded body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::BodyClosed`] after close, or [`HttpError::Io`]
    /// for transport and decoding failures.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut buf = Vec::new();
        self.body()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Release the body stream. Idempotent and never fails.
    pub fn close(&mut self) {
        let released = match std::mem::replace(&mut self.body, BodyState::Closed) {
            BodyState::Pending(mut raw) => raw.release(),
            BodyState::Open(mut decoder) => decoder.get_mut().release(),
            BodyState::Closed => return,
        };
        if let Err(e) = released {
            tracing::debug!(error = %e, status = self.status, "ignoring body release failure");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.body, BodyState::Closed)
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
