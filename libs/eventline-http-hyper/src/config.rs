use eventline_http::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TLS root certificate strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Settings of the hyper backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HyperTransportConfig {
    /// Settings shared with every backend
    pub common: TransportConfig,

    /// TLS root certificate configuration (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Idle timeout for pooled connections (default: 90 seconds)
    ///
    /// `None` keeps idle connections indefinitely.
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per host (default: 32)
    ///
    /// `0` disables connection reuse.
    pub pool_max_idle_per_host: usize,

    /// Worker threads of the private runtime that drives the client (default: 1)
    pub worker_threads: usize,
}

impl Default for HyperTransportConfig {
    fn default() -> Self {
        Self {
            common: TransportConfig::default(),
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            worker_threads: 1,
        }
    }
}

impl HyperTransportConfig {
    /// Configuration for tests against local plain-HTTP servers
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            common: TransportConfig::for_testing(),
            pool_idle_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        }
    }
}

impl From<TransportConfig> for HyperTransportConfig {
    fn from(common: TransportConfig) -> Self {
        Self {
            common,
            ..Default::default()
        }
    }
}
