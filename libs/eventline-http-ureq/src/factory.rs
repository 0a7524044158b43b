use crate::headers::ReadableHeaders;
use crate::request::UreqRequest;
use eventline_http::headers::{ACCEPT_ENCODING, USER_AGENT};
use eventline_http::{
    ACCEPTED_ENCODING, Headers, HttpError, Method, Request, RequestFactory, RequestLifecycle,
    TransportConfig, TransportSecurity, Uri, header_pair, validate_target,
};

/// [`RequestFactory`] over a blocking [`ureq::Agent`].
///
/// The agent's connection pool is shared by every request created here.
#[derive(Debug, Clone)]
pub struct UreqRequestFactory {
    agent: ureq::Agent,
    config: TransportConfig,
}

impl UreqRequestFactory {
    /// Factory with an agent that follows no redirects.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidHeaderValue`] if the configured user agent
    /// is not a valid header value.
    pub fn new(config: TransportConfig) -> Result<Self, HttpError> {
        let agent = ureq::AgentBuilder::new()
            .redirects(0)
            .user_agent(&config.user_agent)
            .build();
        Self::with_agent(agent, config)
    }

    /// Factory over a caller-built agent (custom TLS, proxies, ...).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidHeaderValue`] if the configured user agent
    /// is not a valid header value.
    pub fn with_agent(agent: ureq::Agent, config: TransportConfig) -> Result<Self, HttpError> {
        header_pair(USER_AGENT.as_str(), &config.user_agent)?;
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }
        Ok(Self { agent, config })
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl RequestFactory for UreqRequestFactory {
    fn create_request(&self, uri: &Uri, method: &Method) -> Result<Box<dyn Request>, HttpError> {
        validate_target(uri, self.config.transport)?;

        let mut headers = ReadableHeaders::default();
        headers.put(ACCEPT_ENCODING.as_str(), ACCEPTED_ENCODING)?;
        headers.put(USER_AGENT.as_str(), &self.config.user_agent)?;

        let lifecycle = RequestLifecycle::new(
            method.clone(),
            uri.clone(),
            self.config.content_encoding,
            self.config.request_timeout,
        );
        Ok(Box::new(UreqRequest::new(
            lifecycle,
            headers,
            self.agent.clone(),
        )))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use eventline_http::{ContentEncoding, DEFAULT_USER_AGENT};

    #[test]
    fn test_request_carries_default_headers() {
        let factory = UreqRequestFactory::new(TransportConfig::for_testing()).unwrap();
        let uri: Uri = "http://localhost:8080/events".parse().unwrap();
        let request = factory.create_request(&uri, &Method::POST).unwrap();

        let headers = request.headers();
        assert_eq!(headers.get("accept-encoding").unwrap(), vec!["gzip"]);
        assert_eq!(
            headers.get_first("user-agent").unwrap().as_deref(),
            Some(DEFAULT_USER_AGENT)
        );
        assert!(headers.get("content-encoding").unwrap().is_empty());
    }

    #[test]
    fn test_body_acquisition_announces_encoding() {
        let config = TransportConfig::for_testing().with_content_encoding(ContentEncoding::Gzip);
        let factory = UreqRequestFactory::new(config).unwrap();
        let uri: Uri = "http://localhost:8080/events".parse().unwrap();
        let mut request = factory.create_request(&uri, &Method::POST).unwrap();

        request.body().unwrap();
        assert_eq!(
            request.headers().get("content-encoding").unwrap(),
            vec!["gzip"]
        );
        assert_eq!(request.headers().get("accept-encoding").unwrap(), vec!["gzip"]);
    }

    #[test]
    fn test_tls_only_rejects_http() {
        let factory = UreqRequestFactory::new(TransportConfig::default()).unwrap();
        let uri: Uri = "http://localhost:8080/events".parse().unwrap();
        assert!(matches!(
            factory.create_request(&uri, &Method::GET),
            Err(HttpError::InvalidScheme { .. })
        ));
    }

    /// Collects the messages of WARN events emitted while `f` runs.
    fn captured_warnings(f: impl FnOnce()) -> Vec<String> {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            warnings: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = MessageVisitor(String::new());
                    event.record(&mut visitor);
                    self.warnings.lock().unwrap().push(visitor.0);
                }
            }
        }

        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        let capture = WarningCapture::default();
        let warnings = Arc::clone(&capture.warnings);
        let subscriber = tracing_subscriber::registry().with(capture);
        tracing::subscriber::with_default(subscriber, f);

        let captured = warnings.lock().unwrap().clone();
        captured
    }

    #[test]
    fn test_insecure_http_warning_emitted() {
        let warnings = captured_warnings(|| {
            _ = UreqRequestFactory::new(TransportConfig::for_testing());
        });
        assert!(
            warnings.iter().any(|w| w.contains("insecure HTTP")),
            "warning should mention insecure HTTP: {warnings:?}"
        );
    }

    #[test]
    fn test_tls_only_no_warning() {
        let warnings = captured_warnings(|| {
            _ = UreqRequestFactory::new(TransportConfig::default());
        });
        assert!(
            warnings.is_empty(),
            "no insecure HTTP warning expected, got: {warnings:?}"
        );
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let config = TransportConfig {
            user_agent: "bad\r\nagent".to_owned(),
            ..TransportConfig::default()
        };
        assert!(matches!(
            UreqRequestFactory::new(config),
            Err(HttpError::InvalidHeaderValue(_))
        ));
    }
}
