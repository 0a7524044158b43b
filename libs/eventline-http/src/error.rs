use std::io;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Transport error types
///
/// Every backend failure (connection errors, timeouts, interrupted waits,
/// malformed compressed frames) arrives as [`HttpError::Io`]. The remaining
/// variants are contract violations or construction failures raised at the
/// point of misuse.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// I/O failure while talking to the backend or reading a body
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The request was already executed and is now dead
    #[error("Request already executed")]
    AlreadyExecuted,

    /// The request headers can only be written, never read back
    #[error("Header implementation is write-only")]
    WriteOnlyHeaders,

    /// The backend computes `Content-Length` from the serialized body
    #[error("Content-Length to be set by underlying framework")]
    ContentLengthManaged,

    /// The response body was already closed
    #[error("Response body already closed")]
    BodyClosed,

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Invalid request target
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field is
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that was rejected
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },

    /// TLS setup failed while building a backend
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The adapter-private runtime could not be started
    #[error("Failed to start transport runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl HttpError {
    /// Wrap any backend failure into the uniform I/O channel, keeping it as source.
    pub fn io<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HttpError::Io(io::Error::other(err))
    }

    /// A timed out wait, reported through the I/O channel.
    #[must_use]
    pub fn timed_out(timeout: std::time::Duration) -> Self {
        HttpError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("request timed out after {}ms", timeout.as_millis()),
        ))
    }

    /// Returns `true` for programmer errors (misuse of the request/response contracts).
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            HttpError::AlreadyExecuted
                | HttpError::WriteOnlyHeaders
                | HttpError::ContentLengthManaged
                | HttpError::BodyClosed
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_backend_error_preserves_source() {
        let err = HttpError::io(TestError("connection refused"));

        let HttpError::Io(io_err) = &err else {
            panic!("expected Io variant, got {err:?}");
        };
        assert_eq!(io_err.kind(), io::ErrorKind::Other);

        let inner = io_err.get_ref().unwrap();
        let downcast = inner.downcast_ref::<TestError>();
        assert!(downcast.is_some(), "Should be able to downcast to TestError");
        assert_eq!(downcast.unwrap().0, "connection refused");
    }

    #[test]
    fn test_timed_out_is_io_timeout() {
        let err = HttpError::timed_out(std::time::Duration::from_millis(250));
        match err {
            HttpError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_contract_violations_classified() {
        assert!(HttpError::AlreadyExecuted.is_contract_violation());
        assert!(HttpError::WriteOnlyHeaders.is_contract_violation());
        assert!(HttpError::ContentLengthManaged.is_contract_violation());
        assert!(HttpError::BodyClosed.is_contract_violation());
        assert!(!HttpError::io(TestError("reset")).is_contract_violation());
    }

    #[test]
    fn test_capability_messages() {
        assert_eq!(
            HttpError::WriteOnlyHeaders.to_string(),
            "Header implementation is write-only"
        );
        assert_eq!(
            HttpError::ContentLengthManaged.to_string(),
            "Content-Length to be set by underlying framework"
        );
        assert_eq!(
            HttpError::AlreadyExecuted.to_string(),
            "Request already executed"
        );
    }
}
