use crate::config::{HyperTransportConfig, TlsRootConfig};
use crate::headers::WriteOnlyHeaders;
use crate::request::HyperRequest;
use crate::tls;
use bytes::Bytes;
use eventline_http::headers::{ACCEPT_ENCODING, USER_AGENT};
use eventline_http::{
    ACCEPTED_ENCODING, ContentEncoding, HttpError, Method, Request, RequestFactory,
    RequestLifecycle, TransportConfig, TransportSecurity, Uri, validate_target,
};
use http::HeaderValue;
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// [`RequestFactory`] over a pooled hyper client.
///
/// Cheap to share behind an `Arc`; every request reuses the same connection
/// pool and runtime. Must not be dropped from inside an async context, since
/// that would shut the private runtime down on a runtime thread.
pub struct HyperRequestFactory {
    client: HyperClient,
    runtime: Arc<Runtime>,
    config: TransportConfig,
    user_agent: HeaderValue,
}

impl HyperRequestFactory {
    #[must_use]
    pub fn builder() -> HyperRequestFactoryBuilder {
        HyperRequestFactoryBuilder::new()
    }

    /// Shared transport settings this factory was built with.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl RequestFactory for HyperRequestFactory {
    fn create_request(&self, uri: &Uri, method: &Method) -> Result<Box<dyn Request>, HttpError> {
        validate_target(uri, self.config.transport)?;

        let builder = http::Request::builder()
            .method(method.clone())
            .uri(uri.clone());
        let mut headers = WriteOnlyHeaders::new(builder);
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPTED_ENCODING))?;
        headers.insert(USER_AGENT, self.user_agent.clone())?;

        let lifecycle = RequestLifecycle::new(
            method.clone(),
            uri.clone(),
            self.config.content_encoding,
            self.config.request_timeout,
        );
        Ok(Box::new(HyperRequest::new(
            lifecycle,
            headers,
            self.client.clone(),
            Arc::clone(&self.runtime),
        )))
    }
}

impl std::fmt::Debug for HyperRequestFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperRequestFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HyperRequestFactory`].
#[derive(Debug, Clone, Default)]
pub struct HyperRequestFactoryBuilder {
    config: HyperTransportConfig,
}

impl HyperRequestFactoryBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: HyperTransportConfig) -> Self {
        Self { config }
    }

    /// Set the encoding applied to request bodies
    #[must_use]
    pub fn content_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.config.common.content_encoding = encoding;
        self
    }

    /// Bound each `execute()` until the status line and headers arrive
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.common.request_timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.common.user_agent = user_agent.into();
        self
    }

    /// Set transport security mode
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.common.transport = transport;
        self
    }

    /// Allow insecure HTTP connections (for testing only)
    ///
    /// **WARNING**: only for local tests against mock servers.
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.common.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Select the TLS root certificate source
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// `None` keeps idle connections indefinitely.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the worker threads of the private runtime (clamped to at least 1)
    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads.max(1);
        self
    }

    /// Build the factory
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Tls`] if TLS initialization fails,
    /// [`HttpError::InvalidHeaderValue`] for an unusable user agent, and
    /// [`HttpError::Runtime`] if the runtime cannot be started.
    pub fn build(self) -> Result<HyperRequestFactory, HttpError> {
        let HyperTransportConfig {
            common,
            tls_roots,
            pool_idle_timeout,
            pool_max_idle_per_host,
            worker_threads,
        } = self.config;

        if common.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                target: "eventline_http_hyper::security",
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let user_agent = HeaderValue::try_from(common.user_agent.as_str())?;
        let https = tls::https_connector(tls_roots, common.transport)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("eventline-hyper")
            .enable_all()
            .build()
            .map_err(HttpError::Runtime)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(pool_max_idle_per_host);
        if let Some(idle_timeout) = pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let client = client_builder.build::<_, Full<Bytes>>(https);

        tracing::debug!(
            encoding = %common.content_encoding,
            timeout = ?common.request_timeout,
            worker_threads,
            "hyper request factory ready"
        );

        Ok(HyperRequestFactory {
            client,
            runtime: Arc::new(runtime),
            config: common,
            user_agent,
        })
    }
}
