//! Case-insensitive multi-value header views.
//!
//! Request-side headers are a capability-restricted [`Headers`] trait object:
//! backends that only expose a header *builder* fail reads with
//! [`HttpError::WriteOnlyHeaders`] instead of faking an answer. Response-side
//! headers are the read-only [`ResponseHeaders`].

use crate::encoding::ContentEncoding;
use crate::error::HttpError;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use mime::Mime;
use std::collections::BTreeSet;

pub use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};

/// Request-side header contract.
///
/// Every operation is fallible so adapters can report what their backend
/// cannot do.
pub trait Headers: Send {
    /// All values of `name`, in insertion order. Empty when absent.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::WriteOnlyHeaders`] if the view cannot be read.
    fn get(&self, name: &str) -> Result<Vec<String>, HttpError>;

    /// First value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::WriteOnlyHeaders`] if the view cannot be read.
    fn get_first(&self, name: &str) -> Result<Option<String>, HttpError> {
        Ok(self.get(name)?.into_iter().next())
    }

    /// Lowercase names of all present headers.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::WriteOnlyHeaders`] if the view cannot be read.
    fn header_names(&self) -> Result<BTreeSet<String>, HttpError>;

    /// Append a value, keeping existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names/values or once the request was executed.
    fn add(&mut self, name: &str, value: &str) -> Result<(), HttpError>;

    /// Replace all values of `name` with `value`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names/values or once the request was executed.
    fn put(&mut self, name: &str, value: &str) -> Result<(), HttpError>;

    /// Declared `Content-Length`, if present and numeric.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::WriteOnlyHeaders`] if the view cannot be read.
    fn content_length(&self) -> Result<Option<u64>, HttpError>;

    /// Declare `Content-Length`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ContentLengthManaged`] when the backend derives
    /// the length from the serialized body.
    fn set_content_length(&mut self, content_length: u64) -> Result<(), HttpError>;

    /// Declared `Content-Type`, if present and parseable.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::WriteOnlyHeaders`] if the view cannot be read.
    fn content_type(&self) -> Result<Option<Mime>, HttpError>;

    /// Set `Content-Type` to the canonical rendering of `content_type`.
    ///
    /// # Errors
    ///
    /// Returns an error once the request was executed.
    fn set_content_type(&mut self, content_type: &Mime) -> Result<(), HttpError> {
        self.put(CONTENT_TYPE.as_str(), content_type.as_ref())
    }
}

/// Validate a name/value pair before it reaches a backend.
///
/// # Errors
///
/// Returns [`HttpError::InvalidHeaderName`] or [`HttpError::InvalidHeaderValue`].
pub fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HttpError> {
    let name = HeaderName::try_from(name)?;
    let value = HeaderValue::try_from(value)?;
    Ok((name, value))
}

/// Typed reads over an [`http::HeaderMap`], shared by every readable view.
pub trait HeaderMapExt {
    /// All values of `name`; non-ASCII bytes are replaced lossily.
    fn values_of(&self, name: &str) -> Vec<String>;

    /// Lowercase names of all present headers.
    fn names(&self) -> BTreeSet<String>;

    /// Parsed `Content-Length`.
    fn parsed_content_length(&self) -> Option<u64>;

    /// Parsed `Content-Type`.
    fn parsed_content_type(&self) -> Option<Mime>;
}

impl HeaderMapExt for HeaderMap {
    fn values_of(&self, name: &str) -> Vec<String> {
        self.get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect()
    }

    fn names(&self) -> BTreeSet<String> {
        self.keys().map(|name| name.as_str().to_owned()).collect()
    }

    fn parsed_content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
    }

    fn parsed_content_type(&self) -> Option<Mime> {
        self.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }
}

/// Read-only headers of a received response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    map: HeaderMap,
}

impl ResponseHeaders {
    #[must_use]
    pub fn new(map: HeaderMap) -> Self {
        Self { map }
    }

    /// All values of `name`. Empty when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Vec<String> {
        self.map.values_of(name)
    }

    /// First value of `name`.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<String> {
        self.get(name).into_iter().next()
    }

    /// Lowercase names of all present headers.
    #[must_use]
    pub fn header_names(&self) -> BTreeSet<String> {
        self.map.names()
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.map.parsed_content_length()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<Mime> {
        self.map.parsed_content_type()
    }

    /// Encoding the response body was sent with, when it is one we can reverse.
    ///
    /// Repeated `Content-Encoding` lines form one coding list.
    #[must_use]
    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        ContentEncoding::from_header(&self.get(CONTENT_ENCODING.as_str()).join(","))
    }

    /// The underlying map.
    #[must_use]
    pub fn as_map(&self) -> &HeaderMap {
        &self.map
    }
}

impl From<HeaderMap> for ResponseHeaders {
    fn from(map: HeaderMap) -> Self {
        Self::new(map)
    }
}
