use crate::encoding::ContentEncoding;
use crate::error::{HttpError, InvalidUriKind};
use http::Uri;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default User-Agent string for outgoing requests
pub const DEFAULT_USER_AGENT: &str = concat!("eventline-http/", env!("CARGO_PKG_VERSION"));

/// The only coding advertised in `Accept-Encoding`, whatever the request body uses.
pub const ACCEPTED_ENCODING: &str = "gzip";

/// Transport security configuration
///
/// Controls whether request factories accept plain `http` targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    AllowInsecureHttp,
}

/// Settings shared by every backend adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Encoding applied to request bodies (default: identity)
    pub content_encoding: ContentEncoding,

    /// Upper bound for a single `execute()` call, until status and headers arrive
    /// (default: none)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header value
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            content_encoding: ContentEncoding::Identity,
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
        }
    }
}

impl TransportConfig {
    /// Configuration for testing with local servers (allows insecure HTTP)
    ///
    /// **WARNING**: plain HTTP is accepted. Never use in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(10)),
            transport: TransportSecurity::AllowInsecureHttp,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_content_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Parse a target URL string.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUri`] with [`InvalidUriKind::ParseError`] for malformed input.
pub fn parse_target(url: &str) -> Result<Uri, HttpError> {
    url.parse().map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
        url: url.to_owned(),
        kind: InvalidUriKind::ParseError,
        reason: e.to_string(),
    })
}

/// Check that `uri` is absolute and its scheme is allowed by `security`.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUri`] for relative targets and
/// [`HttpError::InvalidScheme`] for schemes the transport may not use.
pub fn validate_target(uri: &Uri, security: TransportSecurity) -> Result<(), HttpError> {
    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }

    match uri.scheme_str() {
        Some("https") => Ok(()),
        Some("http") => match security {
            TransportSecurity::AllowInsecureHttp => Ok(()),
            TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
        },
        Some(scheme) => Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}
