use crate::body::IncomingReader;
use crate::factory::HyperClient;
use crate::headers::WriteOnlyHeaders;
use bytes::Bytes;
use eventline_http::{
    Headers, HttpError, Method, Request, RequestBody, RequestLifecycle, Response, Uri,
};
use http_body_util::Full;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// A single-use request sent through the hyper client.
pub struct HyperRequest {
    lifecycle: RequestLifecycle,
    headers: WriteOnlyHeaders,
    client: HyperClient,
    runtime: Arc<Runtime>,
}

impl HyperRequest {
    pub(crate) fn new(
        lifecycle: RequestLifecycle,
        headers: WriteOnlyHeaders,
        client: HyperClient,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            lifecycle,
            headers,
            client,
            runtime,
        }
    }
}

impl Request for HyperRequest {
    fn method(&self) -> &Method {
        self.lifecycle.method()
    }

    fn uri(&self) -> &Uri {
        self.lifecycle.uri()
    }

    fn headers(&self) -> &dyn Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut dyn Headers {
        &mut self.headers
    }

    fn body(&mut self) -> Result<&mut RequestBody, HttpError> {
        self.lifecycle.acquire_body(&mut self.headers)
    }

    fn execute(&mut self) -> Result<Response, HttpError> {
        let payload = self.lifecycle.begin_execution()?;
        let body = payload.map_or_else(Full::default, |bytes| Full::new(Bytes::from(bytes)));
        let request = self.headers.seal()?.body(body).map_err(HttpError::io)?;

        let client = self.client.clone();
        let timeout = self.lifecycle.timeout();
        let response = self.runtime.block_on(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, client.request(request))
                    .await
                    .map_err(|_| HttpError::timed_out(limit))?,
                None => client.request(request).await,
            };
            result.map_err(HttpError::io)
        })?;

        let (parts, incoming) = response.into_parts();
        let body = IncomingReader::new(incoming, Arc::clone(&self.runtime));
        Ok(Response::new(
            parts.status.as_u16(),
            parts.headers,
            Box::new(body),
        ))
    }
}

impl std::fmt::Debug for HyperRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperRequest")
            .field("method", self.lifecycle.method())
            .field("uri", self.lifecycle.uri())
            .field("executed", &self.lifecycle.is_executed())
            .finish_non_exhaustive()
    }
}
