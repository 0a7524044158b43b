use eventline_http::mime::Mime;
use eventline_http::{Headers, HttpError, header_pair};
use http::header::{HeaderName, HeaderValue};
use std::collections::BTreeSet;

/// Request headers backed by an [`http::request::Builder`].
///
/// Values can be added and replaced but never read back: every read fails
/// with [`HttpError::WriteOnlyHeaders`]. Once the request is executed the
/// builder is handed to the client and mutators fail with
/// [`HttpError::AlreadyExecuted`].
#[derive(Debug)]
pub struct WriteOnlyHeaders {
    builder: Option<http::request::Builder>,
}

impl WriteOnlyHeaders {
    pub(crate) fn new(builder: http::request::Builder) -> Self {
        Self {
            builder: Some(builder),
        }
    }

    /// Replace `name` with an already validated value.
    pub(crate) fn insert(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), HttpError> {
        let headers = self
            .builder
            .as_mut()
            .and_then(http::request::Builder::headers_mut)
            .ok_or(HttpError::AlreadyExecuted)?;
        headers.insert(name, value);
        Ok(())
    }

    /// Hand the builder over for sending; the view is sealed afterwards.
    pub(crate) fn seal(&mut self) -> Result<http::request::Builder, HttpError> {
        self.builder.take().ok_or(HttpError::AlreadyExecuted)
    }
}

impl Headers for WriteOnlyHeaders {
    fn get(&self, _name: &str) -> Result<Vec<String>, HttpError> {
        Err(HttpError::WriteOnlyHeaders)
    }

    fn get_first(&self, _name: &str) -> Result<Option<String>, HttpError> {
        Err(HttpError::WriteOnlyHeaders)
    }

    fn header_names(&self) -> Result<BTreeSet<String>, HttpError> {
        Err(HttpError::WriteOnlyHeaders)
    }

    fn add(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let (name, value) = header_pair(name, value)?;
        let builder = self.seal()?;
        self.builder = Some(builder.header(name, value));
        Ok(())
    }

    fn put(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let (name, value) = header_pair(name, value)?;
        self.insert(name, value)
    }

    fn content_length(&self) -> Result<Option<u64>, HttpError> {
        Err(HttpError::WriteOnlyHeaders)
    }

    fn set_content_length(&mut self, _content_length: u64) -> Result<(), HttpError> {
        Err(HttpError::ContentLengthManaged)
    }

    fn content_type(&self) -> Result<Option<Mime>, HttpError> {
        Err(HttpError::WriteOnlyHeaders)
    }
}
